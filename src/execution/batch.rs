use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use rust_decimal::Decimal;
use tokio::task::JoinSet;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::price_change::{
    CommandError, PriceChangeCommand, PriceChangeCommandHandler, PriceChangeOrder, StoreId,
};
use crate::domain::price_history::{ChangeType, LedgerError, PriceEntry, PriceHistory, PriceHistoryLedger};
use crate::integration::{NotificationKind, Notifier, OutletError, OutletPricingClient};
use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, RetryConfig};

use super::rollback::{RollbackCoordinator, RollbackReport, RollbackTarget};
use super::{panic_message, ExecutionConfig};

// ============================================================================
// Batch Executor - propagates one EXECUTING order to its outlets
// ============================================================================
//
// 1. Walk `affected_store_ids` in order, keeping at most `max_concurrency`
//    updates in flight. Each update sets the POS price, then writes a
//    MARKET_ADJUSTMENT ledger record effective at the order's effective date.
// 2. The first failure stops new updates. Updates already in flight finish
//    and are tallied like any other.
// 3. No failure: COMPLETED, success notification.
// 4. Otherwise: roll back exactly the outlets recorded as updated (plus any
//    whose state is unknown, without a ledger record), mark FAILED with the
//    first failure as reason, failure notification.
//
// Outlet errors never escape `execute`; only order persistence errors do.
//
// ============================================================================

/// Why one outlet could not be updated
#[derive(Debug, Clone, PartialEq)]
pub enum OutletFailure {
    Outlet(OutletError),
    /// POS accepted the price but the ledger refused the record
    Ledger(LedgerError),
    Panicked(String),
    /// Not started before the batch deadline
    DeadlineExceeded(Duration),
}

impl OutletFailure {
    pub fn label(&self) -> &'static str {
        match self {
            OutletFailure::Outlet(e) => e.kind(),
            OutletFailure::Ledger(_) => "ledger",
            OutletFailure::Panicked(_) => "panicked",
            OutletFailure::DeadlineExceeded(_) => "deadline",
        }
    }

    /// The outlet may hold the new price even though the update failed
    fn may_have_applied(&self) -> bool {
        matches!(
            self,
            OutletFailure::Outlet(OutletError::Timeout { .. })
                | OutletFailure::Ledger(_)
                | OutletFailure::Panicked(_)
        )
    }
}

impl fmt::Display for OutletFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutletFailure::Outlet(e) => write!(f, "{}", e),
            OutletFailure::Ledger(e) => write!(f, "price history write failed: {}", e),
            OutletFailure::Panicked(msg) => write!(f, "outlet update panicked: {}", msg),
            OutletFailure::DeadlineExceeded(d) => {
                write!(f, "batch deadline of {}ms exceeded before update started", d.as_millis())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreFailure {
    pub store_id: StoreId,
    pub error: OutletFailure,
}

impl StoreFailure {
    pub fn reason(&self) -> String {
        format!("Price sync failed at store {}: {}", self.store_id, self.error)
    }
}

/// Tally of one propagation pass
#[derive(Debug, Clone, Default)]
pub struct PropagationReport {
    /// Outlets updated and recorded, in list order
    pub succeeded: Vec<StoreId>,
    pub records: Vec<PriceHistory>,
    /// In completion order; the first one aborted the batch
    pub failures: Vec<StoreFailure>,
    pub not_attempted: Vec<StoreId>,
    /// Failed outlets whose POS state is unknown or already changed
    uncertain: Vec<StoreId>,
}

impl PropagationReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&StoreFailure> {
        self.failures.first()
    }

    /// Outlets to restore, in list order: every updated outlet plus every
    /// outlet left in an unknown state
    pub fn rollback_scope(&self, order: &PriceChangeOrder) -> Vec<RollbackTarget> {
        order
            .affected_store_ids
            .iter()
            .copied()
            .filter_map(|id| {
                if self.succeeded.contains(&id) {
                    Some(RollbackTarget::recorded(id))
                } else if self.uncertain.contains(&id) {
                    Some(RollbackTarget::uncertain(id))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Final state of an execution
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub order: PriceChangeOrder,
    pub propagation: PropagationReport,
    pub rollback: Option<RollbackReport>,
}

impl ExecutionOutcome {
    pub fn completed(&self) -> bool {
        self.propagation.is_success()
    }
}

enum OutletOutcome {
    Updated(PriceHistory),
    Failed(OutletFailure),
}

/// Everything a spawned outlet task needs
#[derive(Clone)]
struct OutletTask {
    outlets: Arc<dyn OutletPricingClient>,
    ledger: Arc<PriceHistoryLedger>,
    metrics: Arc<Metrics>,
    order: Arc<PriceChangeOrder>,
    timeout: Duration,
    retry: RetryConfig,
}

impl OutletTask {
    async fn run(self, store_id: StoreId) -> OutletOutcome {
        let order = self.order.clone();
        let product_code = order.product_code.as_str();
        let price: Decimal = order.new_price;
        let timeout = self.timeout;

        let applied = retry_on_transient(&self.retry, |attempt| {
            if attempt > 1 {
                self.metrics.record_outlet_retry(attempt);
            }
            let outlets = self.outlets.clone();
            async move {
                match tokio::time::timeout(timeout, outlets.set_price(store_id, product_code, price)).await {
                    Ok(result) => result,
                    Err(_) => Err(OutletError::Timeout {
                        store_id,
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            }
        })
        .await
        .into_result();

        if let Err(e) = applied {
            self.metrics.record_outlet_update(e.kind());
            return OutletOutcome::Failed(OutletFailure::Outlet(e));
        }

        match self.ledger.record(forward_entry(&order, store_id)).await {
            Ok(record) => {
                self.metrics.record_outlet_update("success");
                OutletOutcome::Updated(record)
            }
            Err(e) => {
                self.metrics.record_outlet_update("ledger");
                OutletOutcome::Failed(OutletFailure::Ledger(e))
            }
        }
    }
}

fn forward_entry(order: &PriceChangeOrder, store_id: StoreId) -> PriceEntry {
    PriceEntry::new(
        &order.product_code,
        &order.target_region,
        order.original_price,
        order.new_price,
        order.effective_date,
        ChangeType::MarketAdjustment,
    )
    .for_store(store_id)
    .with_order(order.order_no)
    .with_product_name(&order.product_name)
    .with_reason(&order.change_reason)
    .created_by(&order.created_by)
    .approved(order.approved_by.clone(), order.approved_at)
}

pub struct BatchExecutor {
    outlets: Arc<dyn OutletPricingClient>,
    ledger: Arc<PriceHistoryLedger>,
    rollback: RollbackCoordinator,
    orders: Arc<PriceChangeCommandHandler>,
    notifier: Arc<dyn Notifier>,
    config: ExecutionConfig,
    metrics: Arc<Metrics>,
}

impl BatchExecutor {
    pub fn new(
        outlets: Arc<dyn OutletPricingClient>,
        ledger: Arc<PriceHistoryLedger>,
        orders: Arc<PriceChangeCommandHandler>,
        notifier: Arc<dyn Notifier>,
        config: ExecutionConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let rollback = RollbackCoordinator::new(
            outlets.clone(),
            ledger.clone(),
            config.outlet_timeout,
            metrics.clone(),
        );
        Self { outlets, ledger, rollback, orders, notifier, config, metrics }
    }

    /// Drive an EXECUTING order to COMPLETED or FAILED
    pub async fn execute(
        &self,
        order: PriceChangeOrder,
        correlation_id: Uuid,
    ) -> Result<ExecutionOutcome, CommandError> {
        let started = std::time::Instant::now();

        tracing::info!(
            order_no = %order.order_no,
            stores = order.affected_store_count(),
            new_price = %order.new_price,
            concurrency = self.config.max_concurrency,
            "🚀 Executing price change"
        );

        let propagation = self.propagate(&order).await;

        let outcome = match propagation.first_failure().cloned() {
            None => {
                let order = self
                    .orders
                    .handle(
                        &order.order_no,
                        PriceChangeCommand::CompleteExecution { updated_stores: propagation.succeeded.clone() },
                        correlation_id,
                    )
                    .await?;
                self.metrics.record_transition(order.status.name());

                tracing::info!(
                    order_no = %order.order_no,
                    success_count = propagation.success_count(),
                    "✅ Price change completed"
                );

                self.notify(NotificationKind::PriceChangeApplied, &order, None).await;
                ExecutionOutcome { order, propagation, rollback: None }
            }
            Some(failure) => {
                let reason = failure.reason();
                tracing::error!(
                    order_no = %order.order_no,
                    store_id = %failure.store_id,
                    success_count = propagation.success_count(),
                    failure_count = propagation.failure_count(),
                    not_attempted = propagation.not_attempted.len(),
                    reason = %reason,
                    "❌ Price change propagation failed"
                );

                let scope = propagation.rollback_scope(&order);
                let rollback = self.rollback.rollback(&order, &scope, &reason).await;

                let order = self
                    .orders
                    .handle(
                        &order.order_no,
                        PriceChangeCommand::FailExecution {
                            reason: reason.clone(),
                            updated_stores: propagation.succeeded.clone(),
                            rolled_back_stores: rollback.restored.clone(),
                            rollback_failed_stores: rollback.failed_stores(),
                        },
                        correlation_id,
                    )
                    .await?;
                self.metrics.record_transition(order.status.name());

                self.notify(NotificationKind::PriceChangeFailed, &order, Some(&reason)).await;
                ExecutionOutcome { order, propagation, rollback: Some(rollback) }
            }
        };

        self.metrics
            .record_execution(outcome.completed(), started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// Fan out the new price; never fails, the report carries the tally
    pub async fn propagate(&self, order: &PriceChangeOrder) -> PropagationReport {
        let deadline = Instant::now() + self.config.batch_deadline;
        let max_in_flight = self.config.max_concurrency.max(1);
        let task = OutletTask {
            outlets: self.outlets.clone(),
            ledger: self.ledger.clone(),
            metrics: self.metrics.clone(),
            order: Arc::new(order.clone()),
            timeout: self.config.outlet_timeout,
            retry: self.config.outlet_retry(),
        };

        let mut report = PropagationReport::default();
        let mut updated: Vec<(usize, StoreId, PriceHistory)> = Vec::new();
        let mut in_flight: JoinSet<(usize, StoreId, OutletOutcome)> = JoinSet::new();
        let mut outstanding: HashMap<usize, StoreId> = HashMap::new();
        let mut pending = order.affected_store_ids.iter().copied().enumerate();

        loop {
            while report.failures.is_empty() && in_flight.len() < max_in_flight {
                let Some((index, store_id)) = pending.next() else { break };

                if Instant::now() >= deadline {
                    tracing::error!(
                        order_no = %order.order_no,
                        store_id = %store_id,
                        "Batch deadline reached, not starting further updates"
                    );
                    self.metrics.record_outlet_update("deadline");
                    report.failures.push(StoreFailure {
                        store_id,
                        error: OutletFailure::DeadlineExceeded(self.config.batch_deadline),
                    });
                    break;
                }

                tracing::debug!(order_no = %order.order_no, store_id = %store_id, "Updating outlet price");
                outstanding.insert(index, store_id);
                let task = task.clone();
                in_flight.spawn(async move {
                    let outcome = AssertUnwindSafe(task.run(store_id))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| OutletOutcome::Failed(OutletFailure::Panicked(panic_message(&*panic))));
                    (index, store_id, outcome)
                });
            }

            let Some(joined) = in_flight.join_next().await else { break };
            let (index, store_id, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // lost task: its outlet stays in `outstanding`
                    tracing::error!(order_no = %order.order_no, error = %e, "Outlet task did not finish");
                    continue;
                }
            };
            outstanding.remove(&index);

            match outcome {
                OutletOutcome::Updated(record) => {
                    tracing::debug!(
                        order_no = %order.order_no,
                        store_id = %store_id,
                        record_id = record.id,
                        "Outlet updated"
                    );
                    updated.push((index, store_id, record));
                }
                OutletOutcome::Failed(error) => {
                    tracing::error!(
                        order_no = %order.order_no,
                        store_id = %store_id,
                        error = %error,
                        "Outlet price update failed"
                    );
                    if error.may_have_applied() {
                        report.uncertain.push(store_id);
                    }
                    report.failures.push(StoreFailure { store_id, error });
                }
            }
        }

        for (_, store_id) in outstanding {
            report.uncertain.push(store_id);
            report.failures.push(StoreFailure {
                store_id,
                error: OutletFailure::Panicked("outlet task lost".to_string()),
            });
        }

        updated.sort_by_key(|(index, _, _)| *index);
        for (_, store_id, record) in updated {
            report.succeeded.push(store_id);
            report.records.push(record);
        }
        report.not_attempted = pending.map(|(_, id)| id).collect();

        report
    }

    async fn notify(&self, kind: NotificationKind, order: &PriceChangeOrder, reason: Option<&str>) {
        let call = async {
            match reason {
                Some(reason) => self.notifier.notify_failure(order, reason).await,
                None => self.notifier.notify_success(order).await,
            }
        };

        let delivered = match tokio::time::timeout(self.config.notify_timeout, call).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(order_no = %order.order_no, error = %e, "Notification failed, order state unaffected");
                false
            }
            Err(_) => {
                tracing::warn!(order_no = %order.order_no, "Notification timed out, order state unaffected");
                false
            }
        };
        self.metrics.record_notification(kind.label(), delivered);
    }
}
