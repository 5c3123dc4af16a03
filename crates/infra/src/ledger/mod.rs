//! Quantity ledgers over the remote store.
//!
//! One generic [`Ledger`] serves both the raw-material stock
//! ([`StockLedger`]) and the packaging stock ([`CategoryStockLedger`]); the key
//! type decides the entity class, so the two keyspaces never mix.
//!
//! ## Mutation paths
//!
//! - **Atomic** (preferred): the store adjusts the quantity server-side.
//!   Concurrent callers on the same key serialize.
//! - **Read-modify-write** (feature `rmw-fallback`): read the class snapshot,
//!   compute locally, write the snapshot back. Two stations interleaving here
//!   lose one update; there is no lock.

use std::marker::PhantomData;

use tracing::{debug, warn};

use printfloor_core::{EntityClass, FloorResult};
use printfloor_inventory::{
    CategoryKey, LedgerKey, LedgerSnapshot, StockKey, clamp_quantity, positive_delta,
};

use crate::store::row::{quantity_or_zero, quantity_row, read_quantity};
use crate::store::{ClassRows, RemoteStore};

pub type StockLedger<S> = Ledger<S, StockKey>;
pub type CategoryStockLedger<S> = Ledger<S, CategoryKey>;

#[derive(Debug, Clone)]
pub struct Ledger<S, K> {
    store: S,
    _key: PhantomData<fn() -> K>,
}

impl<S, K> Ledger<S, K> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            _key: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, K> Ledger<S, K>
where
    S: RemoteStore,
    K: LedgerKey,
{
    /// Add a positive amount; returns the new quantity.
    pub fn add(&self, key: &K, qty: u64) -> FloorResult<u64> {
        key.validate()?;
        let delta = positive_delta(qty)?;
        adjust_quantity(&self.store, K::CLASS, &key.encode(), delta)
    }

    /// Subtract a positive amount, flooring at zero; returns the new quantity.
    pub fn subtract(&self, key: &K, qty: u64) -> FloorResult<u64> {
        key.validate()?;
        let delta = positive_delta(qty)?;
        adjust_quantity(&self.store, K::CLASS, &key.encode(), -delta)
    }

    /// Overwrite the quantity; negative input is clamped to zero.
    pub fn set(&self, key: &K, qty: i64) -> FloorResult<u64> {
        key.validate()?;
        let quantity = clamp_quantity(qty);
        self.store
            .upsert(K::CLASS, &key.encode(), quantity_row(quantity)?)?;
        Ok(quantity)
    }

    /// Current quantity; entries never written read as zero.
    pub fn get(&self, key: &K) -> FloorResult<u64> {
        let row = self.store.get(K::CLASS, &key.encode())?;
        Ok(quantity_or_zero(row.as_ref())?)
    }

    pub fn get_all(&self) -> FloorResult<LedgerSnapshot<K>> {
        let rows = self.store.snapshot(K::CLASS)?;
        Ok(decode_snapshot(&rows))
    }

    /// Create missing entries at zero; returns how many were created.
    ///
    /// Existing quantities are left untouched.
    pub fn ensure_present<I>(&self, keys: I) -> FloorResult<usize>
    where
        I: IntoIterator<Item = K>,
    {
        let existing = self.store.snapshot(K::CLASS)?;
        let mut created = 0;
        for key in keys {
            key.validate()?;
            let encoded = key.encode();
            if !existing.contains_key(&encoded) {
                self.store.upsert(K::CLASS, &encoded, quantity_row(0)?)?;
                created += 1;
            }
        }
        if created > 0 {
            debug!(class = %K::CLASS, created, "created missing ledger entries");
        }
        Ok(created)
    }
}

/// Decode the rows of a ledger class, skipping rows that do not belong to it.
pub fn decode_snapshot<K: LedgerKey>(rows: &ClassRows) -> LedgerSnapshot<K> {
    let mut snapshot = LedgerSnapshot::new();
    for (raw_key, row) in rows {
        let Some(key) = K::decode(raw_key) else {
            debug!(class = %K::CLASS, key = %raw_key, "skipping row with foreign key");
            continue;
        };
        match read_quantity(row) {
            Ok(q) => {
                snapshot.insert(key, q);
            }
            Err(err) => warn!(class = %K::CLASS, key = %raw_key, error = %err, "skipping malformed row"),
        }
    }
    snapshot
}

/// Apply a signed delta to one quantity row, choosing the store's atomic
/// primitive when it has one.
pub(crate) fn adjust_quantity<S>(store: &S, class: EntityClass, key: &str, delta: i64) -> FloorResult<u64>
where
    S: RemoteStore + ?Sized,
{
    if store.supports_atomic_adjust() {
        debug!(class = %class, key, delta, path = "atomic", "adjusting quantity");
        return Ok(store.atomic_adjust(class, key, delta)?);
    }
    read_modify_write(store, class, key, delta)
}

#[cfg(feature = "rmw-fallback")]
fn read_modify_write<S>(store: &S, class: EntityClass, key: &str, delta: i64) -> FloorResult<u64>
where
    S: RemoteStore + ?Sized,
{
    debug!(class = %class, key, delta, path = "read_modify_write", "adjusting quantity");

    let mut rows = store.snapshot(class)?;
    let current = quantity_or_zero(rows.get(key))?;
    let next = printfloor_inventory::apply_delta(current, delta);
    rows.insert(key.to_string(), quantity_row(next)?);
    store.write_rows(class, rows)?;
    Ok(next)
}

#[cfg(not(feature = "rmw-fallback"))]
fn read_modify_write<S>(_store: &S, class: EntityClass, key: &str, _delta: i64) -> FloorResult<u64>
where
    S: RemoteStore + ?Sized,
{
    warn!(class = %class, key, "store lacks atomic adjust and the read-modify-write fallback is disabled");
    Err(printfloor_core::FloorError::unavailable(
        "store has no atomic adjust and the read-modify-write fallback is disabled",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use printfloor_core::FloorError;
    use proptest::prelude::*;

    use crate::store::InMemoryRemoteStore;

    fn red() -> StockKey {
        StockKey::new("PLA", "Red")
    }

    #[test]
    fn subtract_beyond_current_floors_at_zero() {
        let ledger = StockLedger::new(InMemoryRemoteStore::new());
        assert_eq!(ledger.add(&red(), 3).unwrap(), 3);
        assert_eq!(ledger.subtract(&red(), 10).unwrap(), 0);
        assert_eq!(ledger.get(&red()).unwrap(), 0);
    }

    #[test]
    fn zero_amounts_are_invalid_and_touch_nothing() {
        let ledger = StockLedger::new(InMemoryRemoteStore::new());
        assert!(matches!(ledger.add(&red(), 0), Err(FloorError::InvalidState(_))));
        assert!(matches!(ledger.subtract(&red(), 0), Err(FloorError::InvalidState(_))));
        assert!(ledger.get_all().unwrap().is_empty());
    }

    #[test]
    fn set_clamps_negative_values() {
        let ledger = StockLedger::new(InMemoryRemoteStore::new());
        assert_eq!(ledger.set(&red(), -4).unwrap(), 0);
        assert_eq!(ledger.set(&red(), 12).unwrap(), 12);
        assert_eq!(ledger.get(&red()).unwrap(), 12);
    }

    #[test]
    fn keyspaces_are_independent() {
        let store = std::sync::Arc::new(InMemoryRemoteStore::new());
        let stock = StockLedger::new(store.clone());
        let categories = CategoryStockLedger::new(store);

        stock.add(&red(), 5).unwrap();
        categories.add(&CategoryKey::new("PLA", "Red"), 1).unwrap();

        assert_eq!(stock.get(&red()).unwrap(), 5);
        assert_eq!(stock.get_all().unwrap().len(), 1);
        assert_eq!(categories.get_all().unwrap().len(), 1);
    }

    #[test]
    fn ensure_present_only_creates_missing_entries() {
        let ledger = StockLedger::new(InMemoryRemoteStore::new());
        ledger.add(&red(), 4).unwrap();

        let created = ledger
            .ensure_present([red(), StockKey::new("PLA", "Blue")])
            .unwrap();

        assert_eq!(created, 1);
        let all = ledger.get_all().unwrap();
        assert_eq!(all.get(&red()), Some(&4));
        assert_eq!(all.get(&StockKey::new("PLA", "Blue")), Some(&0));
    }

    #[test]
    fn keys_with_separator_are_rejected() {
        let ledger = StockLedger::new(InMemoryRemoteStore::new());
        let bad = StockKey::new("PLA::X", "Red");
        assert!(matches!(ledger.add(&bad, 1), Err(FloorError::InvalidState(_))));
    }

    #[cfg(feature = "rmw-fallback")]
    #[test]
    fn fallback_path_matches_atomic_path_without_contention() {
        let ledger = StockLedger::new(InMemoryRemoteStore::without_atomic_adjust());
        ledger.add(&red(), 7).unwrap();
        ledger.subtract(&red(), 2).unwrap();
        assert_eq!(ledger.subtract(&red(), 9).unwrap(), 0);
        assert_eq!(ledger.add(&red(), 1).unwrap(), 1);
    }

    #[cfg(not(feature = "rmw-fallback"))]
    #[test]
    fn missing_atomic_primitive_is_unavailable_without_fallback() {
        let ledger = StockLedger::new(InMemoryRemoteStore::without_atomic_adjust());
        assert!(matches!(ledger.add(&red(), 1), Err(FloorError::BackendUnavailable(_))));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u64),
        Subtract(u64),
        Set(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u64..500).prop_map(Op::Add),
            (1u64..500).prop_map(Op::Subtract),
            (-100i64..500).prop_map(Op::Set),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: on the atomic path any operation sequence on one key
        /// yields the clamped running result and never goes negative.
        #[test]
        fn atomic_path_accumulates_clamped(ops in prop::collection::vec(op(), 1..40)) {
            let ledger = StockLedger::new(InMemoryRemoteStore::new());
            let mut expected: i64 = 0;

            for op in ops {
                let got = match op {
                    Op::Add(q) => { expected += q as i64; ledger.add(&red(), q) }
                    Op::Subtract(q) => { expected = (expected - q as i64).max(0); ledger.subtract(&red(), q) }
                    Op::Set(q) => { expected = q.max(0); ledger.set(&red(), q) }
                };
                prop_assert_eq!(got.unwrap() as i64, expected);
            }
            prop_assert_eq!(ledger.get(&red()).unwrap() as i64, expected);
        }
    }
}
