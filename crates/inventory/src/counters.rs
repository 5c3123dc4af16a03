//! Label counters and roll-over arithmetic.
//!
//! Every printed roll adds one small and one large label to the running
//! counters. Each time a counter crosses a multiple of the threshold, one
//! physical roll of label stock has been used up and must be deducted from the
//! packaging ledger.

use serde::{Deserialize, Serialize};

/// Labels per physical roll of label stock.
pub const LABEL_ROLL_THRESHOLD: u64 = 1000;

/// Label size; each size has its own counter and its own roll item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSize {
    Small,
    Large,
}

impl LabelSize {
    pub const BOTH: [LabelSize; 2] = [LabelSize::Small, LabelSize::Large];

    /// Storage key of this size's counter row.
    pub fn counter_key(&self) -> &'static str {
        match self {
            LabelSize::Small => "small",
            LabelSize::Large => "large",
        }
    }
}

/// The singleton label counters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounters {
    pub small: u64,
    pub large: u64,
}

impl LabelCounters {
    pub fn new(small: u64, large: u64) -> Self {
        Self { small, large }
    }

    pub fn get(&self, size: LabelSize) -> u64 {
        match size {
            LabelSize::Small => self.small,
            LabelSize::Large => self.large,
        }
    }

    pub fn set(&mut self, size: LabelSize, value: u64) {
        match size {
            LabelSize::Small => self.small = value,
            LabelSize::Large => self.large = value,
        }
    }

    /// Both counters are below the threshold (no rollover pending).
    pub fn is_settled(&self, threshold: u64) -> bool {
        self.small < threshold && self.large < threshold
    }

    /// Labels still missing before the next roll of `size` is used up.
    pub fn remaining_until_roll(&self, size: LabelSize, threshold: u64) -> u64 {
        threshold.saturating_sub(self.get(size) % threshold.max(1))
    }
}

/// A pending deduction computed from one counter value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rollover {
    /// Whole rolls consumed (`floor(count / threshold)`).
    pub rolls: u64,
    /// Labels to remove from the counter (`rolls * threshold`).
    pub labels: u64,
    /// Counter value after the deduction.
    pub remainder: u64,
}

/// Compute the rollover for one counter; `None` when no whole roll is pending.
pub fn rollover(count: u64, threshold: u64) -> Option<Rollover> {
    let rolls = count.checked_div(threshold)?;
    if rolls == 0 {
        return None;
    }
    let labels = rolls * threshold;
    Some(Rollover {
        rolls,
        labels,
        remainder: count - labels,
    })
}

/// Result of one reconciliation pass.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverOutcome {
    pub rolls_small_deducted: u64,
    pub rolls_large_deducted: u64,
}

impl RolloverOutcome {
    pub fn record(&mut self, size: LabelSize, rolls: u64) {
        match size {
            LabelSize::Small => self.rolls_small_deducted = rolls,
            LabelSize::Large => self.rolls_large_deducted = rolls,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.rolls_small_deducted == 0 && self.rolls_large_deducted == 0
    }
}
