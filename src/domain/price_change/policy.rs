use std::collections::HashSet;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::errors::PriceChangeError;
use super::value_objects::{AdjustmentType, StoreId};

// ============================================================================
// Pricing Policy - business rules checked before an order exists
// ============================================================================
//
// - a single adjustment may not move more than `max_adjustment` (10.00)
// - a decrease may not exceed `max_decrease_ratio` (30%) of the original
// - resulting price must stay positive
// - at least one store, no store listed twice
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub max_adjustment: Decimal,
    pub max_decrease_ratio: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            max_adjustment: dec!(10.00),
            max_decrease_ratio: dec!(0.30),
        }
    }
}

/// Prices derived from an accepted adjustment request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceComputation {
    pub new_price: Decimal,
    pub adjustment_percentage: Decimal,
}

impl PricingPolicy {
    pub fn evaluate(
        &self,
        original_price: Decimal,
        adjustment_type: AdjustmentType,
        adjustment_amount: Decimal,
        affected_store_ids: &[StoreId],
    ) -> Result<PriceComputation, PriceChangeError> {
        if original_price <= Decimal::ZERO {
            return Err(PriceChangeError::NonPositiveOriginalPrice(original_price));
        }

        let magnitude = adjustment_amount.abs();
        if magnitude > self.max_adjustment {
            return Err(PriceChangeError::AdjustmentCapExceeded {
                amount: adjustment_amount,
                cap: self.max_adjustment,
            });
        }

        if adjustment_type == AdjustmentType::Decrease
            && magnitude > original_price * self.max_decrease_ratio
        {
            return Err(PriceChangeError::DecreaseLimitExceeded {
                amount: adjustment_amount,
                ratio: self.max_decrease_ratio,
                original_price,
            });
        }

        let new_price = adjustment_type.apply(original_price, adjustment_amount);
        if new_price <= Decimal::ZERO {
            return Err(PriceChangeError::NonPositiveNewPrice(new_price));
        }

        if affected_store_ids.is_empty() {
            return Err(PriceChangeError::NoAffectedStores);
        }
        let mut seen = HashSet::with_capacity(affected_store_ids.len());
        if let Some(dup) = affected_store_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(PriceChangeError::DuplicateStore(*dup));
        }

        Ok(PriceComputation {
            new_price,
            adjustment_percentage: adjustment_percentage(original_price, new_price),
        })
    }
}

/// (new - original) / original * 100, half-up to 4 decimal places
pub fn adjustment_percentage(original_price: Decimal, new_price: Decimal) -> Decimal {
    if original_price.is_zero() {
        return Decimal::ZERO;
    }
    ((new_price - original_price) / original_price * dec!(100))
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores(ids: &[u64]) -> Vec<StoreId> {
        ids.iter().copied().map(StoreId).collect()
    }

    #[test]
    fn test_increase_computes_price_and_percentage() {
        let result = PricingPolicy::default()
            .evaluate(dec!(36.00), AdjustmentType::Increase, dec!(2.00), &stores(&[1, 2, 3]))
            .unwrap();
        assert_eq!(result.new_price, dec!(38.00));
        assert_eq!(result.adjustment_percentage, dec!(5.5556));
    }

    #[test]
    fn test_decrease_percentage_is_negative() {
        let result = PricingPolicy::default()
            .evaluate(dec!(36.00), AdjustmentType::Decrease, dec!(2.00), &stores(&[1]))
            .unwrap();
        assert_eq!(result.new_price, dec!(34.00));
        assert_eq!(result.adjustment_percentage, dec!(-5.5556));
    }

    #[test]
    fn test_cap_is_inclusive() {
        let policy = PricingPolicy::default();
        assert!(policy
            .evaluate(dec!(36.00), AdjustmentType::Increase, dec!(10.00), &stores(&[1]))
            .is_ok());
        let err = policy
            .evaluate(dec!(36.00), AdjustmentType::Increase, dec!(10.01), &stores(&[1]))
            .unwrap_err();
        assert!(matches!(err, PriceChangeError::AdjustmentCapExceeded { .. }));
        assert!(err.is_policy_violation());
    }

    #[test]
    fn test_cap_applies_to_negative_amounts_and_fixed() {
        let policy = PricingPolicy::default();
        assert!(matches!(
            policy.evaluate(dec!(36.00), AdjustmentType::Increase, dec!(-11), &stores(&[1])),
            Err(PriceChangeError::AdjustmentCapExceeded { .. })
        ));
        assert!(matches!(
            policy.evaluate(dec!(36.00), AdjustmentType::Fixed, dec!(38.00), &stores(&[1])),
            Err(PriceChangeError::AdjustmentCapExceeded { .. })
        ));
        let fixed = policy
            .evaluate(dec!(8.00), AdjustmentType::Fixed, dec!(9.00), &stores(&[1]))
            .unwrap();
        assert_eq!(fixed.new_price, dec!(9.00));
        assert_eq!(fixed.adjustment_percentage, dec!(12.5000));
    }

    #[test]
    fn test_decrease_limit_is_thirty_percent_of_original() {
        let policy = PricingPolicy::default();
        // 30% of 30.00 is 9.00
        assert!(policy
            .evaluate(dec!(30.00), AdjustmentType::Decrease, dec!(9.00), &stores(&[1]))
            .is_ok());
        let err = policy
            .evaluate(dec!(30.00), AdjustmentType::Decrease, dec!(9.01), &stores(&[1]))
            .unwrap_err();
        assert!(matches!(err, PriceChangeError::DecreaseLimitExceeded { .. }));

        // the decrease limit does not apply to increases
        assert!(policy
            .evaluate(dec!(20.00), AdjustmentType::Increase, dec!(9.00), &stores(&[1]))
            .is_ok());
    }

    #[test]
    fn test_store_list_rules() {
        let policy = PricingPolicy::default();
        assert_eq!(
            policy.evaluate(dec!(36.00), AdjustmentType::Increase, dec!(1), &[]),
            Err(PriceChangeError::NoAffectedStores)
        );
        assert_eq!(
            policy.evaluate(dec!(36.00), AdjustmentType::Increase, dec!(1), &stores(&[4, 5, 4])),
            Err(PriceChangeError::DuplicateStore(StoreId(4)))
        );
    }

    #[test]
    fn test_non_positive_prices_rejected() {
        let policy = PricingPolicy::default();
        assert!(matches!(
            policy.evaluate(Decimal::ZERO, AdjustmentType::Increase, dec!(1), &stores(&[1])),
            Err(PriceChangeError::NonPositiveOriginalPrice(_))
        ));
        assert!(matches!(
            policy.evaluate(dec!(5), AdjustmentType::Fixed, dec!(0), &stores(&[1])),
            Err(PriceChangeError::NonPositiveNewPrice(_))
        ));
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 1/8 * 100 = 12.5 exactly; 1/3 * 100 = 33.3333...
        assert_eq!(adjustment_percentage(dec!(8), dec!(9)), dec!(12.5));
        assert_eq!(adjustment_percentage(dec!(3), dec!(4)), dec!(33.3333));
        assert_eq!(adjustment_percentage(dec!(3), dec!(5)), dec!(66.6667));
        assert_eq!(adjustment_percentage(Decimal::ZERO, dec!(5)), Decimal::ZERO);
    }
}
