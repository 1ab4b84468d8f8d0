use rust_decimal::Decimal;

use super::value_objects::{OrderStatus, StoreId};

// ============================================================================
// Price Change Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PriceChangeError {
    #[error("Adjustment amount {amount} exceeds the single-change cap of {cap}")]
    AdjustmentCapExceeded { amount: Decimal, cap: Decimal },

    #[error("Price decrease {amount} exceeds {ratio} of original price {original_price}")]
    DecreaseLimitExceeded {
        amount: Decimal,
        ratio: Decimal,
        original_price: Decimal,
    },

    #[error("Original price must be positive, got {0}")]
    NonPositiveOriginalPrice(Decimal),

    #[error("Resulting price must be positive, got {0}")]
    NonPositiveNewPrice(Decimal),

    #[error("Change order must affect at least one store")]
    NoAffectedStores,

    #[error("Store {0} is listed more than once")]
    DuplicateStore(StoreId),

    #[error("Cannot {action} an order in status {from}")]
    InvalidStateTransition {
        from: OrderStatus,
        action: &'static str,
    },

    #[error("Aggregate not initialized")]
    NotInitialized,
}

impl PriceChangeError {
    /// Pricing-rule breaches, rejected before anything is persisted
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            PriceChangeError::AdjustmentCapExceeded { .. }
                | PriceChangeError::DecreaseLimitExceeded { .. }
                | PriceChangeError::NonPositiveOriginalPrice(_)
                | PriceChangeError::NonPositiveNewPrice(_)
                | PriceChangeError::NoAffectedStores
                | PriceChangeError::DuplicateStore(_)
        )
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PriceChangeError::AdjustmentCapExceeded { .. } => "adjustment_cap",
            PriceChangeError::DecreaseLimitExceeded { .. } => "decrease_limit",
            PriceChangeError::NonPositiveOriginalPrice(_) => "original_price",
            PriceChangeError::NonPositiveNewPrice(_) => "new_price",
            PriceChangeError::NoAffectedStores => "no_stores",
            PriceChangeError::DuplicateStore(_) => "duplicate_store",
            PriceChangeError::InvalidStateTransition { .. } => "invalid_transition",
            PriceChangeError::NotInitialized => "not_initialized",
        }
    }
}
