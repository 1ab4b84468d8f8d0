use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::event_sourcing::Aggregate;
use super::commands::{CreatePriceChange, PriceChangeCommand};
use super::errors::PriceChangeError;
use super::events::*;
use super::value_objects::{AdjustmentType, OrderNo, OrderStatus, StoreId};

// ============================================================================
// Price Change Order Aggregate - the order state machine
// ============================================================================
//
// Transitions (any other source state is InvalidStateTransition):
//   approve           PENDING_APPROVAL → APPROVED
//   start execution   APPROVED         → EXECUTING
//   complete          EXECUTING        → COMPLETED
//   fail              EXECUTING        → FAILED(reason)
//   cancel            PENDING_APPROVAL | APPROVED → CANCELLED
//
// Handling a command never mutates the aggregate; the emitted event is
// applied to produce the next snapshot.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChangeOrder {
    // Identity
    pub order_no: OrderNo,
    pub version: i64,
    #[serde(skip)]
    stream_id: String,

    // Set once at creation
    pub product_code: String,
    pub product_name: String,
    pub specification: Option<String>,
    pub target_region: String,
    pub original_price: Decimal,
    pub new_price: Decimal,
    pub adjustment_type: AdjustmentType,
    pub adjustment_amount: Decimal,
    pub adjustment_percentage: Decimal,
    pub change_reason: String,
    pub effective_date: DateTime<Utc>,
    pub affected_store_ids: Vec<StoreId>,

    pub status: OrderStatus,

    // Audit Trail
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub execution_started_at: Option<DateTime<Utc>>,
    pub execution_completed_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,

    // Execution outcome
    pub updated_stores: Vec<StoreId>,
    pub rolled_back_stores: Vec<StoreId>,
    pub rollback_failed_stores: Vec<StoreId>,
}

impl PriceChangeOrder {
    /// Validate a creation request and produce the opening event
    pub fn open(command: &CreatePriceChange) -> Result<PriceChangeEvent, PriceChangeError> {
        let computed = command.policy.evaluate(
            command.original_price,
            command.adjustment_type,
            command.adjustment_amount,
            &command.affected_store_ids,
        )?;

        Ok(PriceChangeEvent::Created(PriceChangeCreated {
            order_no: command.order_no,
            product_code: command.product_code.clone(),
            product_name: command.product_name.clone(),
            specification: command.specification.clone(),
            target_region: command.target_region.clone(),
            original_price: command.original_price,
            new_price: computed.new_price,
            adjustment_type: command.adjustment_type,
            adjustment_amount: command.adjustment_amount,
            adjustment_percentage: computed.adjustment_percentage,
            change_reason: command.change_reason.clone(),
            effective_date: command.effective_date,
            affected_store_ids: command.affected_store_ids.clone(),
            created_by: command.created_by.clone(),
            created_at: Utc::now(),
        }))
    }

    pub fn affected_store_count(&self) -> usize {
        self.affected_store_ids.len()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            OrderStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for PriceChangeOrder {
    type Event = PriceChangeEvent;
    type Command = PriceChangeCommand;
    type Error = PriceChangeError;

    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            PriceChangeEvent::Created(e) => Ok(Self {
                order_no: e.order_no,
                version: 1,
                stream_id: e.order_no.to_string(),
                product_code: e.product_code.clone(),
                product_name: e.product_name.clone(),
                specification: e.specification.clone(),
                target_region: e.target_region.clone(),
                original_price: e.original_price,
                new_price: e.new_price,
                adjustment_type: e.adjustment_type,
                adjustment_amount: e.adjustment_amount,
                adjustment_percentage: e.adjustment_percentage,
                change_reason: e.change_reason.clone(),
                effective_date: e.effective_date,
                affected_store_ids: e.affected_store_ids.clone(),
                status: OrderStatus::PendingApproval,
                created_by: e.created_by.clone(),
                created_at: e.created_at,
                approved_by: None,
                approved_at: None,
                execution_started_at: None,
                execution_completed_at: None,
                cancelled_by: None,
                cancelled_at: None,
                updated_stores: Vec::new(),
                rolled_back_stores: Vec::new(),
                rollback_failed_stores: Vec::new(),
            }),
            _ => Err(PriceChangeError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            PriceChangeEvent::Created(_) => {
                // only valid as the first event
                return Err(PriceChangeError::InvalidStateTransition {
                    from: self.status.clone(),
                    action: "re-create",
                });
            }
            PriceChangeEvent::Approved(e) => {
                self.status = OrderStatus::Approved;
                self.approved_by = Some(e.approved_by.clone());
                self.approved_at = Some(e.approved_at);
            }
            PriceChangeEvent::ExecutionStarted(e) => {
                self.status = OrderStatus::Executing;
                self.execution_started_at = Some(e.started_at);
            }
            PriceChangeEvent::ExecutionCompleted(e) => {
                self.status = OrderStatus::Completed;
                self.execution_completed_at = Some(e.completed_at);
                self.updated_stores = e.updated_stores.clone();
            }
            PriceChangeEvent::ExecutionFailed(e) => {
                self.status = OrderStatus::Failed { reason: e.reason.clone() };
                self.execution_completed_at = Some(e.failed_at);
                self.updated_stores = e.updated_stores.clone();
                self.rolled_back_stores = e.rolled_back_stores.clone();
                self.rollback_failed_stores = e.rollback_failed_stores.clone();
            }
            PriceChangeEvent::Cancelled(e) => {
                self.status = OrderStatus::Cancelled { reason: e.reason.clone() };
                self.cancelled_by = Some(e.cancelled_by.clone());
                self.cancelled_at = Some(e.cancelled_at);
            }
        }

        self.version += 1;
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let now = Utc::now();

        let event = match (command, &self.status) {
            (PriceChangeCommand::Approve { approver }, OrderStatus::PendingApproval) => {
                PriceChangeEvent::Approved(PriceChangeApproved {
                    approved_by: approver.clone(),
                    approved_at: now,
                })
            }
            (PriceChangeCommand::StartExecution, OrderStatus::Approved) => {
                PriceChangeEvent::ExecutionStarted(ExecutionStarted { started_at: now })
            }
            (PriceChangeCommand::CompleteExecution { updated_stores }, OrderStatus::Executing) => {
                PriceChangeEvent::ExecutionCompleted(ExecutionCompleted {
                    completed_at: now,
                    updated_stores: updated_stores.clone(),
                })
            }
            (
                PriceChangeCommand::FailExecution {
                    reason,
                    updated_stores,
                    rolled_back_stores,
                    rollback_failed_stores,
                },
                OrderStatus::Executing,
            ) => PriceChangeEvent::ExecutionFailed(ExecutionFailed {
                reason: reason.clone(),
                failed_at: now,
                updated_stores: updated_stores.clone(),
                rolled_back_stores: rolled_back_stores.clone(),
                rollback_failed_stores: rollback_failed_stores.clone(),
            }),
            (
                PriceChangeCommand::Cancel { cancelled_by, reason },
                OrderStatus::PendingApproval | OrderStatus::Approved,
            ) => PriceChangeEvent::Cancelled(PriceChangeCancelled {
                cancelled_by: cancelled_by.clone(),
                reason: reason.clone(),
                cancelled_at: now,
            }),
            (command, status) => {
                return Err(PriceChangeError::InvalidStateTransition {
                    from: status.clone(),
                    action: command.action(),
                })
            }
        };

        Ok(vec![event])
    }

    fn aggregate_id(&self) -> &str {
        &self.stream_id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::domain::price_change::PricingPolicy;
    use crate::event_sourcing::EventEnvelope;

    fn create_command() -> CreatePriceChange {
        CreatePriceChange {
            order_no: OrderNo::new(NaiveDate::from_ymd_opt(2026, 2, 4).unwrap(), 1).unwrap(),
            product_code: "LATTE-GRANDE".to_string(),
            product_name: "Latte".to_string(),
            specification: Some("Grande".to_string()),
            target_region: "EAST".to_string(),
            original_price: dec!(36.00),
            adjustment_type: AdjustmentType::Increase,
            adjustment_amount: dec!(2.00),
            change_reason: "Cost increase".to_string(),
            effective_date: Utc::now(),
            affected_store_ids: vec![StoreId(1), StoreId(2), StoreId(3)],
            created_by: "zhang.san".to_string(),
            policy: PricingPolicy::default(),
        }
    }

    fn pending_order() -> PriceChangeOrder {
        let event = PriceChangeOrder::open(&create_command()).unwrap();
        PriceChangeOrder::apply_first_event(&event).unwrap()
    }

    fn step(order: &mut PriceChangeOrder, command: PriceChangeCommand) -> Result<(), PriceChangeError> {
        for event in order.handle_command(&command)? {
            order.apply_event(&event)?;
        }
        Ok(())
    }

    #[test]
    fn test_open_derives_prices() {
        let order = pending_order();
        assert_eq!(order.status, OrderStatus::PendingApproval);
        assert_eq!(order.new_price, dec!(38.00));
        assert_eq!(order.adjustment_percentage, dec!(5.5556));
        assert_eq!(order.affected_store_count(), 3);
        assert_eq!(order.aggregate_id(), "PCO-20260204-001");
        assert_eq!(order.version(), 1);
    }

    #[test]
    fn test_open_rejects_policy_violation() {
        let mut command = create_command();
        command.adjustment_amount = dec!(12.00);
        let err = PriceChangeOrder::open(&command).unwrap_err();
        assert!(err.is_policy_violation());
    }

    #[test]
    fn test_full_success_lifecycle() {
        let mut order = pending_order();

        step(&mut order, PriceChangeCommand::Approve { approver: "li.si".into() }).unwrap();
        assert_eq!(order.status, OrderStatus::Approved);
        assert_eq!(order.approved_by.as_deref(), Some("li.si"));
        assert!(order.approved_at.is_some());

        step(&mut order, PriceChangeCommand::StartExecution).unwrap();
        assert_eq!(order.status, OrderStatus::Executing);
        assert!(order.execution_started_at.is_some());

        let stores = order.affected_store_ids.clone();
        step(&mut order, PriceChangeCommand::CompleteExecution { updated_stores: stores }).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.execution_completed_at.is_some());
        assert_eq!(order.updated_stores.len(), 3);
        assert_eq!(order.version(), 4);
        assert!(order.is_terminal());
    }

    #[test]
    fn test_fail_records_reason() {
        let mut order = pending_order();
        step(&mut order, PriceChangeCommand::Approve { approver: "li.si".into() }).unwrap();
        step(&mut order, PriceChangeCommand::StartExecution).unwrap();
        step(
            &mut order,
            PriceChangeCommand::FailExecution {
                reason: "store 2 rejected update".into(),
                updated_stores: vec![StoreId(1)],
                rolled_back_stores: vec![StoreId(1)],
                rollback_failed_stores: vec![],
            },
        )
        .unwrap();

        assert_eq!(order.status.name(), "FAILED");
        assert_eq!(order.failure_reason(), Some("store 2 rejected update"));
        assert!(order.execution_completed_at.is_some());
        assert_eq!(order.rolled_back_stores, vec![StoreId(1)]);
    }

    #[test]
    fn test_double_approval_rejected_and_approver_kept() {
        let mut order = pending_order();
        step(&mut order, PriceChangeCommand::Approve { approver: "li.si".into() }).unwrap();

        let err = step(&mut order, PriceChangeCommand::Approve { approver: "wang.wu".into() }).unwrap_err();
        assert!(matches!(
            err,
            PriceChangeError::InvalidStateTransition { from: OrderStatus::Approved, action: "approve" }
        ));
        assert_eq!(order.approved_by.as_deref(), Some("li.si"));
        assert_eq!(order.version(), 2);
    }

    #[test]
    fn test_transitions_only_from_declared_source_state() {
        let order = pending_order();
        assert!(order.handle_command(&PriceChangeCommand::StartExecution).is_err());
        assert!(order
            .handle_command(&PriceChangeCommand::CompleteExecution { updated_stores: vec![] })
            .is_err());
        assert!(order
            .handle_command(&PriceChangeCommand::FailExecution {
                reason: "x".into(),
                updated_stores: vec![],
                rolled_back_stores: vec![],
                rollback_failed_stores: vec![],
            })
            .is_err());

        let mut approved = pending_order();
        step(&mut approved, PriceChangeCommand::Approve { approver: "li.si".into() }).unwrap();
        assert!(approved
            .handle_command(&PriceChangeCommand::CompleteExecution { updated_stores: vec![] })
            .is_err());
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        let mut order = pending_order();
        step(&mut order, PriceChangeCommand::Approve { approver: "li.si".into() }).unwrap();
        step(&mut order, PriceChangeCommand::StartExecution).unwrap();
        step(&mut order, PriceChangeCommand::CompleteExecution { updated_stores: vec![] }).unwrap();

        let commands = vec![
            PriceChangeCommand::Approve { approver: "x".into() },
            PriceChangeCommand::StartExecution,
            PriceChangeCommand::CompleteExecution { updated_stores: vec![] },
            PriceChangeCommand::Cancel { cancelled_by: "x".into(), reason: None },
        ];
        for command in commands {
            assert!(order.handle_command(&command).is_err(), "{} should be rejected", command.action());
        }
    }

    #[test]
    fn test_cancel_from_pending_and_approved_only() {
        let mut pending = pending_order();
        step(&mut pending, PriceChangeCommand::Cancel { cancelled_by: "zhang.san".into(), reason: Some("typo".into()) }).unwrap();
        assert_eq!(pending.status, OrderStatus::Cancelled { reason: Some("typo".into()) });
        assert_eq!(pending.cancelled_by.as_deref(), Some("zhang.san"));

        let mut approved = pending_order();
        step(&mut approved, PriceChangeCommand::Approve { approver: "li.si".into() }).unwrap();
        step(&mut approved, PriceChangeCommand::Cancel { cancelled_by: "li.si".into(), reason: None }).unwrap();
        assert_eq!(approved.status.name(), "CANCELLED");

        let mut executing = pending_order();
        step(&mut executing, PriceChangeCommand::Approve { approver: "li.si".into() }).unwrap();
        step(&mut executing, PriceChangeCommand::StartExecution).unwrap();
        let err = step(&mut executing, PriceChangeCommand::Cancel { cancelled_by: "li.si".into(), reason: None });
        assert!(matches!(err, Err(PriceChangeError::InvalidStateTransition { .. })));
    }

    #[test]
    fn test_apply_first_event_requires_created() {
        let event = PriceChangeEvent::ExecutionStarted(ExecutionStarted { started_at: Utc::now() });
        assert!(matches!(
            PriceChangeOrder::apply_first_event(&event),
            Err(PriceChangeError::NotInitialized)
        ));
    }

    #[test]
    fn test_load_from_events() {
        let order_no = "PCO-20260204-001";
        let correlation_id = Uuid::new_v4();
        let events = vec![
            EventEnvelope::new(order_no, 1, "PriceChangeCreated", PriceChangeOrder::open(&create_command()).unwrap(), correlation_id),
            EventEnvelope::new(
                order_no,
                2,
                "PriceChangeApproved",
                PriceChangeEvent::Approved(PriceChangeApproved { approved_by: "li.si".into(), approved_at: Utc::now() }),
                correlation_id,
            ),
        ];

        let order = PriceChangeOrder::load_from_events(events).unwrap();
        assert_eq!(order.version, 2);
        assert_eq!(order.status, OrderStatus::Approved);
        assert_eq!(order.aggregate_id(), order_no);
    }
}
