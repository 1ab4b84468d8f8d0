use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::event_sourcing::DomainEvent;
use super::value_objects::{AdjustmentType, OrderNo, StoreId};

// ============================================================================
// Price Change Events
// ============================================================================
//
// One event per lifecycle transition. The stream of an order is its
// append-only transition log.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PriceChangeEvent {
    Created(PriceChangeCreated),
    Approved(PriceChangeApproved),
    ExecutionStarted(ExecutionStarted),
    ExecutionCompleted(ExecutionCompleted),
    ExecutionFailed(ExecutionFailed),
    Cancelled(PriceChangeCancelled),
}

impl PriceChangeEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            PriceChangeEvent::Created(_) => "PriceChangeCreated",
            PriceChangeEvent::Approved(_) => "PriceChangeApproved",
            PriceChangeEvent::ExecutionStarted(_) => "ExecutionStarted",
            PriceChangeEvent::ExecutionCompleted(_) => "ExecutionCompleted",
            PriceChangeEvent::ExecutionFailed(_) => "ExecutionFailed",
            PriceChangeEvent::Cancelled(_) => "PriceChangeCancelled",
        }
    }

    /// Who caused the transition; `None` for engine-driven steps
    pub fn actor(&self) -> Option<&str> {
        match self {
            PriceChangeEvent::Created(e) => Some(&e.created_by),
            PriceChangeEvent::Approved(e) => Some(&e.approved_by),
            PriceChangeEvent::Cancelled(e) => Some(&e.cancelled_by),
            PriceChangeEvent::ExecutionStarted(_)
            | PriceChangeEvent::ExecutionCompleted(_)
            | PriceChangeEvent::ExecutionFailed(_) => None,
        }
    }
}

impl DomainEvent for PriceChangeEvent {
    fn event_type() -> &'static str { "PriceChangeEvent" }
}

/// Order submitted and accepted by the pricing policy
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PriceChangeCreated {
    pub order_no: OrderNo,
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
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PriceChangeApproved {
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExecutionStarted {
    pub started_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExecutionCompleted {
    pub completed_at: DateTime<Utc>,
    pub updated_stores: Vec<StoreId>,
}

/// Propagation aborted; carries what was updated and what the
/// compensation managed to restore
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExecutionFailed {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
    pub updated_stores: Vec<StoreId>,
    pub rolled_back_stores: Vec<StoreId>,
    pub rollback_failed_stores: Vec<StoreId>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PriceChangeCancelled {
    pub cancelled_by: String,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}
