use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::policy::PricingPolicy;
use super::value_objects::{AdjustmentType, OrderNo, StoreId};

// ============================================================================
// Price Change Commands - Represent user intent
// ============================================================================

/// Opens a new order stream. `original_price` is resolved by the caller
/// from the price ledger; the aggregate derives the rest.
#[derive(Debug, Clone)]
pub struct CreatePriceChange {
    pub order_no: OrderNo,
    pub product_code: String,
    pub product_name: String,
    pub specification: Option<String>,
    pub target_region: String,
    pub original_price: Decimal,
    pub adjustment_type: AdjustmentType,
    pub adjustment_amount: Decimal,
    pub change_reason: String,
    pub effective_date: DateTime<Utc>,
    pub affected_store_ids: Vec<StoreId>,
    pub created_by: String,
    pub policy: PricingPolicy,
}

/// Commands against an existing order
#[derive(Debug, Clone)]
pub enum PriceChangeCommand {
    Approve {
        approver: String,
    },
    StartExecution,
    CompleteExecution {
        updated_stores: Vec<StoreId>,
    },
    FailExecution {
        reason: String,
        updated_stores: Vec<StoreId>,
        rolled_back_stores: Vec<StoreId>,
        rollback_failed_stores: Vec<StoreId>,
    },
    Cancel {
        cancelled_by: String,
        reason: Option<String>,
    },
}

impl PriceChangeCommand {
    pub fn action(&self) -> &'static str {
        match self {
            PriceChangeCommand::Approve { .. } => "approve",
            PriceChangeCommand::StartExecution => "start execution of",
            PriceChangeCommand::CompleteExecution { .. } => "complete",
            PriceChangeCommand::FailExecution { .. } => "fail",
            PriceChangeCommand::Cancel { .. } => "cancel",
        }
    }
}
