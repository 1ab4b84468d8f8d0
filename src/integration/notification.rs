use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::price_change::{OrderNo, PriceChangeOrder, StoreId};

// ============================================================================
// Notification Collaborator
// ============================================================================
//
// Fire-and-forget from the engine's point of view: an error returned here
// is logged by the caller and never changes the order.
//
// ============================================================================

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_success(&self, order: &PriceChangeOrder) -> anyhow::Result<()>;

    async fn notify_failure(&self, order: &PriceChangeOrder, reason: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    PriceChangeApplied,
    PriceChangeFailed,
}

impl NotificationKind {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationKind::PriceChangeApplied => "success",
            NotificationKind::PriceChangeFailed => "failure",
        }
    }
}

/// Message body sent to regional managers and operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeNotification {
    pub kind: NotificationKind,
    pub order_no: OrderNo,
    pub product_code: String,
    pub product_name: String,
    pub target_region: String,
    pub original_price: Decimal,
    pub new_price: Decimal,
    pub adjustment_percentage: Decimal,
    pub affected_store_count: usize,
    pub updated_stores: Vec<StoreId>,
    pub failure_reason: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl PriceChangeNotification {
    pub fn applied(order: &PriceChangeOrder) -> Self {
        Self::build(NotificationKind::PriceChangeApplied, order, None)
    }

    pub fn failed(order: &PriceChangeOrder, reason: &str) -> Self {
        Self::build(NotificationKind::PriceChangeFailed, order, Some(reason.to_string()))
    }

    fn build(kind: NotificationKind, order: &PriceChangeOrder, failure_reason: Option<String>) -> Self {
        Self {
            kind,
            order_no: order.order_no,
            product_code: order.product_code.clone(),
            product_name: order.product_name.clone(),
            target_region: order.target_region.clone(),
            original_price: order.original_price,
            new_price: order.new_price,
            adjustment_percentage: order.adjustment_percentage,
            affected_store_count: order.affected_store_count(),
            updated_stores: order.updated_stores.clone(),
            failure_reason,
            sent_at: Utc::now(),
        }
    }
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_success(&self, order: &PriceChangeOrder) -> anyhow::Result<()> {
        tracing::info!(
            order_no = %order.order_no,
            region = %order.target_region,
            stores = order.affected_store_count(),
            new_price = %order.new_price,
            "📣 Price change applied"
        );
        Ok(())
    }

    async fn notify_failure(&self, order: &PriceChangeOrder, reason: &str) -> anyhow::Result<()> {
        tracing::error!(
            order_no = %order.order_no,
            region = %order.target_region,
            reason = %reason,
            "📣 Price change failed"
        );
        Ok(())
    }
}
