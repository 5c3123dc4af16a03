//! Logical collections in the remote store.

use serde::{Deserialize, Serialize};

/// A logical collection subject to its own change-notification channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    /// Raw-material stock per (material type, color).
    Stock,
    /// Packaging and consumables stock per (category, item).
    CategoryStock,
    /// The singleton small/large label counters.
    Counters,
    /// Append-only production event log.
    ProductionEvents,
}

impl EntityClass {
    pub const ALL: [EntityClass; 4] = [
        EntityClass::Stock,
        EntityClass::CategoryStock,
        EntityClass::Counters,
        EntityClass::ProductionEvents,
    ];

    /// Stable storage name (table / hash / channel suffix).
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::Stock => "stock",
            EntityClass::CategoryStock => "category_stock",
            EntityClass::Counters => "counters",
            EntityClass::ProductionEvents => "production_events",
        }
    }
}

impl core::fmt::Display for EntityClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
