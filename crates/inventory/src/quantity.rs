//! Quantity arithmetic shared by every ledger.
//!
//! Quantities are never negative: subtraction floors at zero instead of
//! failing, and `set` clamps negative input to zero.

use serde::{Deserialize, Serialize};

use printfloor_core::{FloorError, FloorResult};

/// Stored row shape for every quantity-bearing entity class.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityRow {
    #[serde(default)]
    pub quantity: u64,
}

impl QuantityRow {
    pub fn new(quantity: u64) -> Self {
        Self { quantity }
    }
}

/// Clamp an arbitrary integer to a valid quantity.
pub fn clamp_quantity(value: i64) -> u64 {
    value.max(0) as u64
}

/// Apply a signed delta, flooring the result at zero.
pub fn apply_delta(current: u64, delta: i64) -> u64 {
    if delta >= 0 {
        current.saturating_add(delta as u64)
    } else {
        current.saturating_sub(delta.unsigned_abs())
    }
}

/// Validate an add/subtract amount and turn it into a storage delta.
pub fn positive_delta(qty: u64) -> FloorResult<i64> {
    if qty == 0 {
        return Err(FloorError::invalid("quantity must be a positive integer"));
    }
    i64::try_from(qty).map_err(|_| FloorError::invalid(format!("quantity {qty} is too large")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn subtracting_past_zero_floors() {
        assert_eq!(apply_delta(3, -10), 0);
        assert_eq!(apply_delta(3, -3), 0);
        assert_eq!(apply_delta(3, -1), 2);
    }

    #[test]
    fn negative_set_values_clamp_to_zero() {
        assert_eq!(clamp_quantity(-5), 0);
        assert_eq!(clamp_quantity(12), 12);
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert!(matches!(positive_delta(0), Err(FloorError::InvalidState(_))));
        assert_eq!(positive_delta(4).unwrap(), 4);
        assert!(positive_delta(u64::MAX).is_err());
    }

    #[test]
    fn missing_quantity_field_reads_as_zero() {
        let row: QuantityRow = serde_json::from_str("{}").unwrap();
        assert_eq!(row.quantity, 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: folding any delta sequence equals a clamped running sum
        /// and never produces a negative quantity.
        #[test]
        fn folding_deltas_matches_clamped_running_sum(
            deltas in prop::collection::vec(-1_000i64..1_000i64, 0..50)
        ) {
            let mut q = 0u64;
            let mut expected: i64 = 0;
            for d in deltas {
                q = apply_delta(q, d);
                expected = (expected + d).max(0);
                prop_assert_eq!(q as i64, expected);
            }
        }
    }
}
