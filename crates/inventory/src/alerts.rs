//! Low-stock alerts against configured minimum levels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::keys::{CategoryKey, LedgerSnapshot, StockKey};

/// Configured minimum quantities. Entries without a minimum (or with zero) never alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumLevels {
    pub materials: BTreeMap<StockKey, u64>,
    pub categories: BTreeMap<CategoryKey, u64>,
}

impl MinimumLevels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_material(mut self, key: StockKey, minimum: u64) -> Self {
        self.materials.insert(key, minimum);
        self
    }

    pub fn with_category(mut self, key: CategoryKey, minimum: u64) -> Self {
        self.categories.insert(key, minimum);
        self
    }
}

/// What an alert is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertSubject {
    Material(StockKey),
    Category(CategoryKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub subject: AlertSubject,
    pub current: u64,
    pub minimum: u64,
}

impl StockAlert {
    pub fn shortfall(&self) -> u64 {
        self.minimum.saturating_sub(self.current)
    }
}

fn collect<K: Ord + Clone>(
    stock: &LedgerSnapshot<K>,
    minimums: &BTreeMap<K, u64>,
    wrap: impl Fn(K) -> AlertSubject,
    out: &mut Vec<StockAlert>,
) {
    for (key, &current) in stock {
        let minimum = minimums.get(key).copied().unwrap_or(0);
        if minimum > 0 && current < minimum {
            out.push(StockAlert {
                subject: wrap(key.clone()),
                current,
                minimum,
            });
        }
    }
}

/// Entries of the given snapshots that sit below their minimum, most critical first.
///
/// Only entries present in the snapshots are checked; a minimum configured for
/// an item the ledger has never seen does not alert.
pub fn low_stock_alerts(
    stock: &LedgerSnapshot<StockKey>,
    categories: &LedgerSnapshot<CategoryKey>,
    minimums: &MinimumLevels,
) -> Vec<StockAlert> {
    let mut alerts = Vec::new();
    collect(stock, &minimums.materials, AlertSubject::Material, &mut alerts);
    collect(categories, &minimums.categories, AlertSubject::Category, &mut alerts);

    alerts.sort_by(|a, b| b.shortfall().cmp(&a.shortfall()));
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_are_sorted_by_shortfall() {
        let red = StockKey::new("PLA", "Red");
        let blue = StockKey::new("PLA", "Blue");
        let boxes = CategoryKey::new("boxes-1k", "1k Box");

        let stock = LedgerSnapshot::from([(red.clone(), 2), (blue.clone(), 9)]);
        let cats = LedgerSnapshot::from([(boxes.clone(), 0)]);
        let minimums = MinimumLevels::new()
            .with_material(red.clone(), 5)
            .with_material(blue, 5)
            .with_category(boxes.clone(), 20);

        let alerts = low_stock_alerts(&stock, &cats, &minimums);

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].subject, AlertSubject::Category(boxes));
        assert_eq!(alerts[0].shortfall(), 20);
        assert_eq!(alerts[1].subject, AlertSubject::Material(red));
        assert_eq!(alerts[1].shortfall(), 3);
    }

    #[test]
    fn zero_minimum_and_unknown_entries_never_alert() {
        let red = StockKey::new("PLA", "Red");
        let stock = LedgerSnapshot::from([(red.clone(), 0)]);
        let minimums = MinimumLevels::new()
            .with_material(red, 0)
            .with_material(StockKey::new("PETG", "Black"), 10);

        assert!(low_stock_alerts(&stock, &LedgerSnapshot::new(), &minimums).is_empty());
    }
}
