//! Inventory domain module.
//!
//! Business rules for the shop-floor ledgers, implemented purely as
//! deterministic logic (no IO, no storage): ledger keys, clamped quantity
//! arithmetic, label counters with their roll-over math, and low-stock alerts.

pub mod alerts;
pub mod counters;
pub mod keys;
pub mod quantity;

pub use alerts::{AlertSubject, MinimumLevels, StockAlert, low_stock_alerts};
pub use counters::{
    LABEL_ROLL_THRESHOLD, LabelCounters, LabelSize, Rollover, RolloverOutcome, rollover,
};
pub use keys::{CategoryKey, KEY_SEPARATOR, LedgerKey, LedgerSnapshot, StockKey};
pub use quantity::{QuantityRow, apply_delta, clamp_quantity, positive_delta};
