//! Facts appended to an event log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A fact written once to an append-only log and never updated.
pub trait Event: Serialize + DeserializeOwned + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted type name, e.g. `production.print.recorded`.
    const EVENT_TYPE: &'static str;

    /// Row schema version.
    const VERSION: u32;

    /// Key the event is stored under. Unique within its log.
    fn log_key(&self) -> String;

    fn occurred_at(&self) -> DateTime<Utc>;
}
