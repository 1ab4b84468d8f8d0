use crate::domain::price_change::{CommandError, PriceChangeError};
use crate::sequence::SequenceError;

/// Errors surfaced to callers of `PricingWorkflow`. Outlet and rollback
/// failures are never among them: they end in a FAILED order instead.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Policy violation: {0}")]
    PolicyViolation(PriceChangeError),

    #[error("Price change order not found: {0}")]
    OrderNotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(PriceChangeError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Infrastructure error: {0:#}")]
    Infrastructure(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::PolicyViolation(_) => "policy_violation",
            WorkflowError::OrderNotFound(_) => "order_not_found",
            WorkflowError::InvalidStateTransition(_) => "invalid_state_transition",
            WorkflowError::InvalidRequest(_) => "invalid_request",
            WorkflowError::Infrastructure(_) => "infrastructure",
        }
    }
}

impl From<PriceChangeError> for WorkflowError {
    fn from(e: PriceChangeError) -> Self {
        match e {
            e if e.is_policy_violation() => WorkflowError::PolicyViolation(e),
            e @ PriceChangeError::InvalidStateTransition { .. } => WorkflowError::InvalidStateTransition(e),
            e => WorkflowError::Infrastructure(anyhow::Error::new(e)),
        }
    }
}

impl From<CommandError> for WorkflowError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::Domain(e) => e.into(),
            CommandError::NotFound(order_no) => WorkflowError::OrderNotFound(order_no),
            CommandError::AlreadyExists(order_no) => {
                WorkflowError::Infrastructure(anyhow::anyhow!("Order number {} already taken", order_no))
            }
            CommandError::Store(e) => WorkflowError::Infrastructure(e),
        }
    }
}

impl From<SequenceError> for WorkflowError {
    fn from(e: SequenceError) -> Self {
        WorkflowError::Infrastructure(anyhow::Error::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::domain::price_change::OrderStatus;

    #[test]
    fn test_domain_errors_are_classified() {
        let cap = PriceChangeError::AdjustmentCapExceeded { amount: dec!(12), cap: dec!(10) };
        assert!(matches!(WorkflowError::from(cap), WorkflowError::PolicyViolation(_)));

        let transition = PriceChangeError::InvalidStateTransition {
            from: OrderStatus::Completed,
            action: "approve",
        };
        let err = WorkflowError::from(CommandError::Domain(transition));
        assert_eq!(err.kind(), "invalid_state_transition");
        assert!(err.to_string().contains("COMPLETED"));

        let missing = WorkflowError::from(CommandError::NotFound("PCO-20260204-001".into()));
        assert!(matches!(missing, WorkflowError::OrderNotFound(ref no) if no == "PCO-20260204-001"));
    }
}
