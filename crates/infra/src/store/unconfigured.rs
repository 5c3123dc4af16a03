use printfloor_core::EntityClass;
use printfloor_events::{ChangeNotification, Subscription};

use super::r#trait::{ClassRows, RemoteStore, Row, StoreError};

/// Stand-in used when no backing store is configured.
///
/// Every operation fails with [`StoreError::Unavailable`] so callers fail
/// fast instead of retrying.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredStore {
    reason: String,
}

impl UnconfiguredStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        let reason = if self.reason.is_empty() {
            "no remote store configured"
        } else {
            self.reason.as_str()
        };
        Err(StoreError::Unavailable(reason.to_string()))
    }
}

impl RemoteStore for UnconfiguredStore {
    fn upsert(&self, _class: EntityClass, _key: &str, _row: Row) -> Result<(), StoreError> {
        self.fail()
    }

    fn get(&self, _class: EntityClass, _key: &str) -> Result<Option<Row>, StoreError> {
        self.fail()
    }

    fn snapshot(&self, _class: EntityClass) -> Result<ClassRows, StoreError> {
        self.fail()
    }

    fn supports_atomic_adjust(&self) -> bool {
        false
    }

    fn atomic_adjust(&self, _class: EntityClass, _key: &str, _delta: i64) -> Result<u64, StoreError> {
        self.fail()
    }

    fn subscribe(&self, _class: EntityClass) -> Result<Subscription<ChangeNotification>, StoreError> {
        self.fail()
    }

    fn append_only(&self, _class: EntityClass, _key: &str, _row: Row) -> Result<(), StoreError> {
        self.fail()
    }

    fn remove(&self, _class: EntityClass, _keys: &[String]) -> Result<usize, StoreError> {
        self.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printfloor_core::FloorError;

    #[test]
    fn every_call_maps_to_backend_unavailable() {
        let store = UnconfiguredStore::default();
        let err: FloorError = store.snapshot(EntityClass::Stock).unwrap_err().into();
        assert!(matches!(err, FloorError::BackendUnavailable(_)));
        assert!(!err.is_retryable());
    }
}
