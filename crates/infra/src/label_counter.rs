//! Persisted label counters and roll-over reconciliation.
//!
//! `increment` and `reconcile` are separate round trips. A station may
//! increment between another station's read and adjust inside `reconcile`;
//! because the counter is reduced by a relative delta, that increment is kept
//! on the atomic path. Two stations reconciling the same crossing at once can
//! both deduct a roll. There is no lock for this.

use tracing::{debug, info};

use printfloor_core::{EntityClass, FloorError, FloorResult};
use printfloor_inventory::{LabelCounters, LabelSize, RolloverOutcome, rollover};

use crate::config::PackagingItems;
use crate::ledger::{CategoryStockLedger, adjust_quantity};
use crate::store::RemoteStore;
use crate::store::row::{quantity_or_zero, quantity_row};

#[derive(Debug, Clone)]
pub struct LabelCounter<S> {
    store: S,
    categories: CategoryStockLedger<S>,
    packaging: PackagingItems,
    threshold: u64,
}

impl<S> LabelCounter<S>
where
    S: RemoteStore + Clone,
{
    pub fn new(store: S, packaging: PackagingItems, threshold: u64) -> Self {
        Self {
            categories: CategoryStockLedger::new(store.clone()),
            store,
            packaging,
            threshold,
        }
    }
}

impl<S> LabelCounter<S>
where
    S: RemoteStore,
{
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Add printed labels to the counters. Never rolls over.
    pub fn increment(&self, small: u64, large: u64) -> FloorResult<LabelCounters> {
        let mut counters = self.get()?;
        for (size, delta) in [(LabelSize::Small, small), (LabelSize::Large, large)] {
            if delta == 0 {
                continue;
            }
            let delta = i64::try_from(delta)
                .map_err(|_| FloorError::invalid(format!("label delta {delta} is too large")))?;
            let value = adjust_quantity(&self.store, EntityClass::Counters, size.counter_key(), delta)?;
            counters.set(size, value);
        }
        debug!(small = counters.small, large = counters.large, "label counters incremented");
        Ok(counters)
    }

    pub fn get(&self) -> FloorResult<LabelCounters> {
        let mut counters = LabelCounters::default();
        for size in LabelSize::BOTH {
            let row = self.store.get(EntityClass::Counters, size.counter_key())?;
            counters.set(size, quantity_or_zero(row.as_ref())?);
        }
        Ok(counters)
    }

    /// Deduct one label roll per full threshold on each counter.
    ///
    /// Per size: the packaging deduction happens first, then the counter is
    /// reduced by `rolls * threshold`. A failure stops the pass; sizes already
    /// handled stay handled.
    pub fn reconcile(&self) -> FloorResult<RolloverOutcome> {
        let counters = self.get()?;
        let mut outcome = RolloverOutcome::default();

        for size in LabelSize::BOTH {
            let Some(pending) = rollover(counters.get(size), self.threshold) else {
                continue;
            };

            let roll_item = self.packaging.label_roll(size);
            let left = self.categories.subtract(roll_item, pending.rolls)?;

            let labels = i64::try_from(pending.labels)
                .map_err(|_| FloorError::invalid(format!("label count {} is too large", pending.labels)))?;
            adjust_quantity(&self.store, EntityClass::Counters, size.counter_key(), -labels)?;

            outcome.record(size, pending.rolls);
            info!(
                size = size.counter_key(),
                rolls = pending.rolls,
                item = %roll_item,
                rolls_left = left,
                "label rolls deducted"
            );
        }

        Ok(outcome)
    }

    /// Set both counters back to zero.
    pub fn reset(&self) -> FloorResult<()> {
        for size in LabelSize::BOTH {
            self.store
                .upsert(EntityClass::Counters, size.counter_key(), quantity_row(0)?)?;
        }
        info!("label counters reset");
        Ok(())
    }
}
