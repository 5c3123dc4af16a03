//! Infrastructure layer: remote store, ledgers, orchestration, sync, config.

pub mod config;
pub mod event_log;
pub mod label_counter;
pub mod ledger;
pub mod production;
pub mod store;
pub mod sync;
pub mod workers;


pub use config::{ConfigError, FloorConfig, PackagingItems, RolloverMode, StoreConfig};
pub use event_log::EventLog;
pub use label_counter::LabelCounter;
pub use ledger::{CategoryStockLedger, Ledger, StockLedger};
pub use production::{PrintReport, PrintStep, ProductionService, RolloverStatus, StepOutcome};
pub use store::{
    InMemoryRemoteStore, RemoteStore, SharedStore, StoreError, UnconfiguredStore, open_store,
};
pub use sync::{RealtimeSync, SyncOptions};
