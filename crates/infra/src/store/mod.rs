//! Remote store boundary.
//!
//! This module defines the storage abstraction shared by every station and
//! the backends implementing it. Ledgers, counters and the event log hold a
//! store handle and nothing else.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod row;
pub mod r#trait;
pub mod unconfigured;

use std::sync::Arc;

use tracing::info;

pub use in_memory::InMemoryRemoteStore;
#[cfg(feature = "redis")]
pub use redis::RedisRemoteStore;
pub use r#trait::{ClassRows, RemoteStore, Row, StoreError};
pub use unconfigured::UnconfiguredStore;

use crate::config::StoreConfig;

/// Shared, type-erased store handle.
pub type SharedStore = Arc<dyn RemoteStore>;

/// Build the store described by the configuration.
pub fn open_store(config: &StoreConfig) -> Result<SharedStore, StoreError> {
    match config {
        StoreConfig::Unconfigured => {
            info!(backend = "none", "no remote store configured; operations will fail fast");
            Ok(Arc::new(UnconfiguredStore::new("PRINTFLOOR_STORE is not set")))
        }
        StoreConfig::Memory => {
            info!(backend = "memory", "opening in-process store");
            Ok(Arc::new(InMemoryRemoteStore::new()))
        }
        #[cfg(feature = "redis")]
        StoreConfig::Redis { url } => {
            info!(backend = "redis", "opening redis store");
            Ok(Arc::new(RedisRemoteStore::new(url)?))
        }
        #[cfg(not(feature = "redis"))]
        StoreConfig::Redis { .. } => Err(StoreError::Unavailable(
            "redis store requested but the `redis` feature is not enabled".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printfloor_core::EntityClass;

    #[test]
    fn unconfigured_config_opens_a_failing_store() {
        let store = open_store(&StoreConfig::Unconfigured).unwrap();
        assert!(matches!(
            store.snapshot(EntityClass::Stock),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn memory_config_opens_an_atomic_store() {
        let store = open_store(&StoreConfig::Memory).unwrap();
        assert!(store.supports_atomic_adjust());
    }
}
