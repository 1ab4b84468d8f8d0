use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

use crate::domain::price_change::{PriceChangeOrder, StoreId};
use crate::domain::price_history::{ChangeType, PriceEntry, PriceHistoryLedger};
use crate::integration::{OutletError, OutletPricingClient};
use crate::metrics::Metrics;

use super::panic_message;

// ============================================================================
// Rollback Coordinator - compensation after a failed propagation
// ============================================================================
//
// Restores `original_price` at each given outlet, in order. Outlets with a
// forward MARKET_ADJUSTMENT record get a ROLLBACK record; outlets whose
// update never reached the ledger are restored without one, so the history
// never shows a move away from a price it did not record. Every outlet is
// attempted regardless of earlier failures, and nothing here returns an
// error: the report says which outlets were restored.
//
// ============================================================================

/// One outlet to restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollbackTarget {
    pub store_id: StoreId,
    /// A forward record exists in the ledger for this outlet
    pub recorded: bool,
}

impl RollbackTarget {
    pub fn recorded(store_id: StoreId) -> Self {
        Self { store_id, recorded: true }
    }

    /// The outlet may hold the new price but the ledger never saw it
    pub fn uncertain(store_id: StoreId) -> Self {
        Self { store_id, recorded: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollbackReport {
    pub restored: Vec<StoreId>,
    pub failed: Vec<(StoreId, String)>,
    /// Restored at the outlet but the ROLLBACK record could not be written
    pub unrecorded: Vec<StoreId>,
    /// Restored without a ledger write: no forward record to compensate
    pub restored_unlogged: Vec<StoreId>,
}

impl RollbackReport {
    pub fn failed_stores(&self) -> Vec<StoreId> {
        self.failed.iter().map(|(id, _)| *id).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct RollbackCoordinator {
    outlets: Arc<dyn OutletPricingClient>,
    ledger: Arc<PriceHistoryLedger>,
    outlet_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl RollbackCoordinator {
    pub fn new(
        outlets: Arc<dyn OutletPricingClient>,
        ledger: Arc<PriceHistoryLedger>,
        outlet_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { outlets, ledger, outlet_timeout, metrics }
    }

    pub async fn rollback(&self, order: &PriceChangeOrder, targets: &[RollbackTarget], reason: &str) -> RollbackReport {
        let mut report = RollbackReport::default();

        if targets.is_empty() {
            tracing::info!(order_no = %order.order_no, "No outlets to roll back");
            return report;
        }

        tracing::warn!(
            order_no = %order.order_no,
            stores = targets.len(),
            reason = %reason,
            "⏪ Rolling back price change"
        );

        for &RollbackTarget { store_id, recorded } in targets {
            if let Err(e) = self.restore_outlet(order, store_id).await {
                tracing::error!(
                    order_no = %order.order_no,
                    store_id = %store_id,
                    error = %e,
                    "Rollback failed for outlet, continuing"
                );
                self.metrics.record_rollback(false);
                report.failed.push((store_id, e.to_string()));
                continue;
            }
            self.metrics.record_rollback(true);
            report.restored.push(store_id);

            if !recorded {
                tracing::warn!(
                    order_no = %order.order_no,
                    store_id = %store_id,
                    "Outlet restored, no forward record to compensate"
                );
                report.restored_unlogged.push(store_id);
                continue;
            }

            let entry = rollback_entry(order, store_id, reason);
            if let Err(e) = self.ledger.record(entry).await {
                tracing::error!(
                    order_no = %order.order_no,
                    store_id = %store_id,
                    error = %e,
                    "Outlet restored but rollback record not written"
                );
                report.unrecorded.push(store_id);
            }
        }

        tracing::info!(
            order_no = %order.order_no,
            restored = report.restored.len(),
            failed = report.failed.len(),
            "Rollback finished"
        );

        report
    }

    async fn restore_outlet(&self, order: &PriceChangeOrder, store_id: StoreId) -> Result<(), OutletError> {
        let call = self.outlets.set_price(store_id, &order.product_code, order.original_price);
        match tokio::time::timeout(self.outlet_timeout, AssertUnwindSafe(call).catch_unwind()).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(OutletError::Unavailable {
                store_id,
                message: format!("client panicked: {}", panic_message(&*panic)),
            }),
            Err(_) => Err(OutletError::Timeout {
                store_id,
                timeout_ms: self.outlet_timeout.as_millis() as u64,
            }),
        }
    }
}

/// Compensating record: moves the outlet from the order's new price back
/// to its original price
fn rollback_entry(order: &PriceChangeOrder, store_id: StoreId, reason: &str) -> PriceEntry {
    PriceEntry::new(
        &order.product_code,
        &order.target_region,
        order.new_price,
        order.original_price,
        order.effective_date,
        ChangeType::Rollback,
    )
    .for_store(store_id)
    .with_order(order.order_no)
    .with_product_name(&order.product_name)
    .with_reason(&order.change_reason)
    .created_by("system")
    .with_remark(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    use crate::domain::price_change::{AdjustmentType, CreatePriceChange, PricingPolicy, OrderNo};
    use crate::domain::price_history::LedgerKey;
    use crate::event_sourcing::Aggregate;
    use crate::integration::SimulatedPosClient;

    fn order() -> PriceChangeOrder {
        let command = CreatePriceChange {
            order_no: OrderNo::new(NaiveDate::from_ymd_opt(2026, 2, 4).unwrap(), 1).unwrap(),
            product_code: "LATTE".to_string(),
            product_name: "Latte".to_string(),
            specification: None,
            target_region: "EAST".to_string(),
            original_price: dec!(36.00),
            adjustment_type: AdjustmentType::Increase,
            adjustment_amount: dec!(2.00),
            change_reason: "Cost increase".to_string(),
            effective_date: Utc::now(),
            affected_store_ids: vec![StoreId(1), StoreId(2), StoreId(3)],
            created_by: "zhang.san".to_string(),
            policy: PricingPolicy::default(),
        };
        let event = PriceChangeOrder::open(&command).unwrap();
        PriceChangeOrder::apply_first_event(&event).unwrap()
    }

    fn recorded(ids: &[u64]) -> Vec<RollbackTarget> {
        ids.iter().map(|&id| RollbackTarget::recorded(StoreId(id))).collect()
    }

    fn coordinator(pos: Arc<SimulatedPosClient>, ledger: Arc<PriceHistoryLedger>) -> RollbackCoordinator {
        RollbackCoordinator::new(pos, ledger, Duration::from_millis(100), Arc::new(Metrics::new().unwrap()))
    }

    #[tokio::test]
    async fn test_restores_each_outlet_and_records_rollback() {
        let pos = Arc::new(SimulatedPosClient::new());
        let ledger = Arc::new(PriceHistoryLedger::new(dec!(36.00)));
        let order = order();

        let report = coordinator(pos.clone(), ledger.clone())
            .rollback(&order, &recorded(&[1, 3]), "store 2 failed")
            .await;

        assert_eq!(report.restored, vec![StoreId(1), StoreId(3)]);
        assert!(report.is_complete());
        assert_eq!(pos.price_of(StoreId(1), "LATTE").await, Some(dec!(36.00)));
        assert_eq!(pos.price_of(StoreId(2), "LATTE").await, None);

        let records = ledger.records_for(&LedgerKey::new("LATTE", "EAST", Some(StoreId(3)))).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].change_type, ChangeType::Rollback);
        assert_eq!(records[0].original_price, dec!(38.00));
        assert_eq!(records[0].new_price, dec!(36.00));
        assert_eq!(records[0].remark.as_deref(), Some("store 2 failed"));
        assert_eq!(records[0].change_order_no, Some(order.order_no));
    }

    #[tokio::test]
    async fn test_failure_on_one_outlet_does_not_stop_the_rest() {
        let pos = Arc::new(
            SimulatedPosClient::new()
                .rejecting(StoreId(1), dec!(36.00))
                .with_latency(StoreId(2), Duration::from_millis(300)),
        );
        let ledger = Arc::new(PriceHistoryLedger::new(dec!(36.00)));

        let report = coordinator(pos.clone(), ledger)
            .rollback(&order(), &recorded(&[1, 2, 3]), "boom")
            .await;

        assert_eq!(report.restored, vec![StoreId(3)]);
        assert_eq!(report.failed_stores(), vec![StoreId(1), StoreId(2)]);
        assert!(report.failed[1].1.contains("did not answer"));
        assert_eq!(pos.called_stores().await, vec![StoreId(1), StoreId(2), StoreId(3)]);
    }

    #[tokio::test]
    async fn test_panicking_client_counts_as_failed_restoration() {
        let pos = Arc::new(SimulatedPosClient::new().panicking(StoreId(1)));
        let ledger = Arc::new(PriceHistoryLedger::new(dec!(36.00)));

        let report = coordinator(pos, ledger).rollback(&order(), &recorded(&[1, 2]), "boom").await;

        assert_eq!(report.restored, vec![StoreId(2)]);
        assert!(report.failed[0].1.contains("panicked"));
    }

    #[tokio::test]
    async fn test_uncertain_outlet_restored_without_rollback_record() {
        let pos = Arc::new(SimulatedPosClient::new());
        let ledger = Arc::new(PriceHistoryLedger::new(dec!(36.00)));
        let targets = vec![RollbackTarget::recorded(StoreId(1)), RollbackTarget::uncertain(StoreId(2))];

        let report = coordinator(pos.clone(), ledger.clone())
            .rollback(&order(), &targets, "store 2 timed out")
            .await;

        assert_eq!(report.restored, vec![StoreId(1), StoreId(2)]);
        assert_eq!(report.restored_unlogged, vec![StoreId(2)]);
        assert_eq!(pos.price_of(StoreId(2), "LATTE").await, Some(dec!(36.00)));
        assert_eq!(ledger.records_for(&LedgerKey::new("LATTE", "EAST", Some(StoreId(1)))).await.len(), 1);
        assert!(ledger.records_for(&LedgerKey::new("LATTE", "EAST", Some(StoreId(2)))).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_scope_is_a_no_op() {
        let pos = Arc::new(SimulatedPosClient::new());
        let ledger = Arc::new(PriceHistoryLedger::new(dec!(36.00)));

        let report = coordinator(pos.clone(), ledger).rollback(&order(), &[], "nothing updated").await;

        assert_eq!(report, RollbackReport::default());
        assert!(pos.calls().await.is_empty());
    }
}
