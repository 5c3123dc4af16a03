use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use printfloor_core::{EntityClass, FloorError, FloorResult};

/// Separator between the two key components in storage keys (`"PLA::Red"`).
pub const KEY_SEPARATOR: &str = "::";

/// Point-in-time view of every entry of one ledger.
pub type LedgerSnapshot<K> = BTreeMap<K, u64>;

/// A composite key addressing one quantity row of a ledger.
///
/// Each key type owns exactly one entity class, which keeps the raw-material
/// and packaging keyspaces independent even though both ledgers share an
/// implementation.
pub trait LedgerKey:
    Clone + Eq + Ord + core::hash::Hash + core::fmt::Debug + Send + Sync + 'static
{
    /// Entity class the rows of this ledger live in.
    const CLASS: EntityClass;

    /// Storage key, `"<first>::<second>"`.
    fn encode(&self) -> String;

    /// Parse a storage key; `None` for keys that do not belong to this ledger.
    fn decode(raw: &str) -> Option<Self>;

    /// Reject keys that could not round-trip through storage.
    fn validate(&self) -> FloorResult<()>;
}

fn split_key(raw: &str) -> Option<(&str, &str)> {
    let (first, second) = raw.split_once(KEY_SEPARATOR)?;
    if first.is_empty() || second.is_empty() || second.contains(KEY_SEPARATOR) {
        return None;
    }
    Some((first, second))
}

fn validate_component(what: &str, value: &str) -> FloorResult<()> {
    if value.trim().is_empty() {
        return Err(FloorError::invalid(format!("{what} cannot be empty")));
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(FloorError::invalid(format!(
            "{what} cannot contain '{KEY_SEPARATOR}': {value}"
        )));
    }
    Ok(())
}

/// Raw-material stock key: `(material type, color)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub material_type: String,
    pub color: String,
}

impl StockKey {
    pub fn new(material_type: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            material_type: material_type.into(),
            color: color.into(),
        }
    }
}

impl LedgerKey for StockKey {
    const CLASS: EntityClass = EntityClass::Stock;

    fn encode(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.material_type, self.color)
    }

    fn decode(raw: &str) -> Option<Self> {
        split_key(raw).map(|(t, c)| Self::new(t, c))
    }

    fn validate(&self) -> FloorResult<()> {
        validate_component("material type", &self.material_type)?;
        validate_component("color", &self.color)
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.material_type, self.color)
    }
}

/// Packaging/consumable stock key: `(category id, item name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryKey {
    pub category_id: String,
    pub item_name: String,
}

impl CategoryKey {
    pub fn new(category_id: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            item_name: item_name.into(),
        }
    }
}

impl LedgerKey for CategoryKey {
    const CLASS: EntityClass = EntityClass::CategoryStock;

    fn encode(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.category_id, self.item_name)
    }

    fn decode(raw: &str) -> Option<Self> {
        split_key(raw).map(|(c, i)| Self::new(c, i))
    }

    fn validate(&self) -> FloorResult<()> {
        validate_component("category id", &self.category_id)?;
        validate_component("item name", &self.item_name)
    }
}

impl core::fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.category_id, self.item_name)
    }
}
