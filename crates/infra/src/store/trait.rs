use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use printfloor_core::{EntityClass, FloorError};
use printfloor_events::{ChangeNotification, Subscription};

/// A stored row. Quantity-bearing classes use `{"quantity": n}`; the event
/// log stores whole serialized events.
pub type Row = JsonValue;

/// All rows of one entity class, keyed by storage key.
pub type ClassRows = BTreeMap<String, Row>;

/// Remote store operation error.
///
/// These are **infrastructure errors** (configuration, connectivity,
/// capability) as opposed to ledger-level precondition failures, which never
/// reach the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has no usable configuration.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Transient failure talking to the backend.
    #[error("store backend failure: {0}")]
    Backend(String),

    /// The backend does not offer the requested primitive.
    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),

    /// A row could not be encoded or decoded.
    #[error("malformed row: {0}")]
    Encoding(String),

    /// An append-only write targeted a key that already exists.
    #[error("row {key} already exists in {class}")]
    Duplicate { class: EntityClass, key: String },
}

impl From<StoreError> for FloorError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(msg) => FloorError::BackendUnavailable(msg),
            StoreError::Unsupported(op) => {
                FloorError::BackendUnavailable(format!("store does not support {op}"))
            }
            other => FloorError::BackendError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Encoding(value.to_string())
    }
}

/// Keyed rows grouped by entity class, shared by every station.
///
/// The store is the only authority: local views are caches, and nothing is
/// coordinated between stations except through these operations. Every call
/// is a round trip and may fail independently.
///
/// ## Atomic adjust
///
/// `atomic_adjust` is optional. Callers check `supports_atomic_adjust()` first
/// and fall back to a read-modify-write of the whole class when it is absent.
/// When present it must be serializable per key and floor the result at zero.
///
/// ## Notifications
///
/// Every write publishes a [`ChangeNotification`] on the class channel.
/// Delivery is best effort; subscribers treat a notification only as a hint
/// to re-fetch.
pub trait RemoteStore: Send + Sync {
    /// Insert or replace one row.
    fn upsert(&self, class: EntityClass, key: &str, row: Row) -> Result<(), StoreError>;

    /// Read one row; `None` when absent.
    fn get(&self, class: EntityClass, key: &str) -> Result<Option<Row>, StoreError>;

    /// Read every row of a class.
    fn snapshot(&self, class: EntityClass) -> Result<ClassRows, StoreError>;

    /// Whether [`atomic_adjust`](Self::atomic_adjust) is available.
    fn supports_atomic_adjust(&self) -> bool;

    /// Add `delta` to the `quantity` of a row server-side, creating it at zero
    /// first if absent and flooring at zero. Returns the new quantity.
    fn atomic_adjust(&self, class: EntityClass, key: &str, delta: i64) -> Result<u64, StoreError>;

    /// Subscribe to change notifications of one class.
    fn subscribe(&self, class: EntityClass) -> Result<Subscription<ChangeNotification>, StoreError>;

    /// Insert a row that must not exist yet. Rows written this way are never
    /// updated afterwards.
    fn append_only(&self, class: EntityClass, key: &str, row: Row) -> Result<(), StoreError>;

    /// Delete rows of a class. Absent keys are skipped; returns how many
    /// rows were deleted.
    fn remove(&self, class: EntityClass, keys: &[String]) -> Result<usize, StoreError>;

    /// Write back a set of rows (the read-modify-write fallback path).
    ///
    /// Not atomic across rows; the default writes them one by one.
    fn write_rows(&self, class: EntityClass, rows: ClassRows) -> Result<(), StoreError> {
        for (key, row) in rows {
            self.upsert(class, &key, row)?;
        }
        Ok(())
    }
}

impl<S> RemoteStore for Arc<S>
where
    S: RemoteStore + ?Sized,
{
    fn upsert(&self, class: EntityClass, key: &str, row: Row) -> Result<(), StoreError> {
        (**self).upsert(class, key, row)
    }

    fn get(&self, class: EntityClass, key: &str) -> Result<Option<Row>, StoreError> {
        (**self).get(class, key)
    }

    fn snapshot(&self, class: EntityClass) -> Result<ClassRows, StoreError> {
        (**self).snapshot(class)
    }

    fn supports_atomic_adjust(&self) -> bool {
        (**self).supports_atomic_adjust()
    }

    fn atomic_adjust(&self, class: EntityClass, key: &str, delta: i64) -> Result<u64, StoreError> {
        (**self).atomic_adjust(class, key, delta)
    }

    fn subscribe(&self, class: EntityClass) -> Result<Subscription<ChangeNotification>, StoreError> {
        (**self).subscribe(class)
    }

    fn append_only(&self, class: EntityClass, key: &str, row: Row) -> Result<(), StoreError> {
        (**self).append_only(class, key, row)
    }

    fn remove(&self, class: EntityClass, keys: &[String]) -> Result<usize, StoreError> {
        (**self).remove(class, keys)
    }

    fn write_rows(&self, class: EntityClass, rows: ClassRows) -> Result<(), StoreError> {
        (**self).write_rows(class, rows)
    }
}
