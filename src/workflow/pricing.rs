use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::price_change::{
    CommandError, OrderNo, PriceChangeCommand, PriceChangeCommandHandler, PriceChangeError, PriceChangeEvent,
    PriceChangeOrder, PricingPolicy, StatusTransition, StoreId,
};
use crate::domain::price_history::{PriceHistory, PriceHistoryLedger};
use crate::event_sourcing::EventStore;
use crate::execution::{BatchExecutor, ExecutionOutcome};
use crate::integration::{Notifier, OutletPricingClient};
use crate::metrics::Metrics;
use crate::sequence::{self, InMemorySequenceGenerator, SequenceGenerator};

use super::errors::WorkflowError;
use super::requests::{
    BatchCreation, BatchPriceChangeRequest, BatchRejection, PriceChangeRequest, ProductInfo, RegionalPrice,
};

// ============================================================================
// Pricing Workflow - entry point for callers
// ============================================================================
//
// create   → policy check, order number, PENDING_APPROVAL
// approve  → APPROVED
// execute  → EXECUTING, then BatchExecutor drives COMPLETED | FAILED
// cancel   → CANCELLED (from PENDING_APPROVAL or APPROVED)
//
// ============================================================================

/// Order numbers tried before creation gives up on collisions
const MAX_ORDER_NO_ATTEMPTS: usize = 5;

pub struct PricingWorkflow {
    orders: Arc<PriceChangeCommandHandler>,
    ledger: Arc<PriceHistoryLedger>,
    sequence: Arc<dyn SequenceGenerator>,
    executor: BatchExecutor,
    policy: PricingPolicy,
    metrics: Arc<Metrics>,
}

impl PricingWorkflow {
    pub fn new(
        config: &EngineConfig,
        sequence: Arc<dyn SequenceGenerator>,
        outlets: Arc<dyn OutletPricingClient>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let event_store: Arc<EventStore<PriceChangeEvent>> = Arc::new(EventStore::new("PriceChangeOrder"));
        let orders = Arc::new(PriceChangeCommandHandler::new(event_store));
        let ledger = Arc::new(PriceHistoryLedger::new(config.fallback_base_price));
        let executor = BatchExecutor::new(
            outlets,
            ledger.clone(),
            orders.clone(),
            notifier,
            config.execution.clone(),
            metrics.clone(),
        );

        Self {
            orders,
            ledger,
            sequence,
            executor,
            policy: config.policy.clone(),
            metrics,
        }
    }

    pub fn ledger(&self) -> &Arc<PriceHistoryLedger> {
        &self.ledger
    }

    /// Open a change order in PENDING_APPROVAL. The original price is the
    /// region's current ledger price.
    pub async fn create(&self, request: PriceChangeRequest) -> Result<PriceChangeOrder, WorkflowError> {
        request.validate()?;
        let original_price = self
            .ledger
            .current_price(&request.product_code, &request.target_region, Utc::now())
            .await;
        self.open(request, original_price).await
    }

    /// One independent `create` per (product, region) pair. A rejected member
    /// does not affect its siblings.
    pub async fn create_batch(&self, request: BatchPriceChangeRequest) -> BatchCreation {
        tracing::info!(
            products = request.products.len(),
            regions = request.regional_prices.len(),
            "Creating batch of price change orders"
        );

        let mut result = BatchCreation::default();
        for product in &request.products {
            for regional in &request.regional_prices {
                let created = self.create_member(&request, product, regional).await;
                match created {
                    Ok(order) => result.orders.push(order),
                    Err(error) => {
                        tracing::warn!(
                            product_code = %product.product_code,
                            region = %regional.region,
                            error = %error,
                            "Batch member rejected"
                        );
                        result.rejections.push(BatchRejection {
                            product_code: product.product_code.clone(),
                            region: regional.region.clone(),
                            error,
                        });
                    }
                }
            }
        }

        tracing::info!(
            created = result.orders.len(),
            rejected = result.rejections.len(),
            "Batch creation finished"
        );
        result
    }

    async fn create_member(
        &self,
        request: &BatchPriceChangeRequest,
        product: &ProductInfo,
        regional: &RegionalPrice,
    ) -> Result<PriceChangeOrder, WorkflowError> {
        if regional.price <= Decimal::ZERO {
            let error = PriceChangeError::NonPositiveNewPrice(regional.price);
            self.metrics.record_rejection(error.kind());
            return Err(WorkflowError::PolicyViolation(error));
        }

        let current_price = self
            .ledger
            .current_price(&product.product_code, &regional.region, Utc::now())
            .await;
        let member = request.member(product, regional, current_price);
        member.validate()?;
        self.open(member, current_price).await
    }

    async fn open(&self, request: PriceChangeRequest, original_price: Decimal) -> Result<PriceChangeOrder, WorkflowError> {
        // rejected requests never consume an order number
        if let Err(e) = self.policy.evaluate(
            original_price,
            request.adjustment_type,
            request.adjustment_amount,
            &request.affected_store_ids,
        ) {
            tracing::warn!(
                product_code = %request.product_code,
                region = %request.target_region,
                original_price = %original_price,
                amount = %request.adjustment_amount,
                error = %e,
                "🚫 Price change rejected by policy"
            );
            self.metrics.record_rejection(e.kind());
            return Err(e.into());
        }

        let date = sequence::today();
        let correlation_id = Uuid::new_v4();

        for attempt in 1..=MAX_ORDER_NO_ATTEMPTS {
            let order_no = self.sequence.next(date).await?;
            let command = request.clone().into_command(order_no, original_price, self.policy.clone());

            match self.orders.create(command, correlation_id).await {
                Ok(order) => {
                    self.metrics.orders_created.inc();
                    self.metrics.record_transition(order.status.name());
                    tracing::info!(
                        order_no = %order.order_no,
                        original_price = %order.original_price,
                        new_price = %order.new_price,
                        adjustment_percentage = %order.adjustment_percentage,
                        "📝 Price change order awaiting approval"
                    );
                    return Ok(order);
                }
                Err(CommandError::AlreadyExists(taken)) => {
                    tracing::warn!(order_no = %taken, attempt = attempt, "Order number already taken, reserving another");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(WorkflowError::Infrastructure(anyhow::anyhow!(
            "No free order number for {} after {} attempts",
            date,
            MAX_ORDER_NO_ATTEMPTS
        )))
    }

    pub async fn approve(&self, order_no: &OrderNo, approver: &str) -> Result<PriceChangeOrder, WorkflowError> {
        if approver.trim().is_empty() {
            return Err(WorkflowError::InvalidRequest("approver must not be blank".to_string()));
        }

        let order = self
            .transition(order_no, PriceChangeCommand::Approve { approver: approver.to_string() })
            .await?;
        tracing::info!(order_no = %order_no, approver = %approver, "✅ Price change order approved");
        Ok(order)
    }

    /// Withdraw an order that has not started executing
    pub async fn cancel(
        &self,
        order_no: &OrderNo,
        cancelled_by: &str,
        reason: Option<String>,
    ) -> Result<PriceChangeOrder, WorkflowError> {
        if cancelled_by.trim().is_empty() {
            return Err(WorkflowError::InvalidRequest("cancelled_by must not be blank".to_string()));
        }

        let order = self
            .transition(
                order_no,
                PriceChangeCommand::Cancel { cancelled_by: cancelled_by.to_string(), reason },
            )
            .await?;
        tracing::info!(order_no = %order_no, cancelled_by = %cancelled_by, "Price change order cancelled");
        Ok(order)
    }

    /// Run an approved order. `Ok(true)` when it ended COMPLETED, `Ok(false)`
    /// when it ended FAILED; rollback has already been attempted by then.
    pub async fn execute(&self, order_no: &OrderNo) -> Result<bool, WorkflowError> {
        Ok(self.execute_with_report(order_no).await?.completed())
    }

    /// `execute`, returning the full propagation and rollback tally
    pub async fn execute_with_report(&self, order_no: &OrderNo) -> Result<ExecutionOutcome, WorkflowError> {
        let correlation_id = Uuid::new_v4();
        let order = self
            .orders
            .handle(order_no, PriceChangeCommand::StartExecution, correlation_id)
            .await?;
        self.metrics.record_transition(order.status.name());

        Ok(self.executor.execute(order, correlation_id).await?)
    }

    pub async fn find(&self, order_no: &OrderNo) -> Result<PriceChangeOrder, WorkflowError> {
        Ok(self.orders.load(order_no).await?)
    }

    /// Status changes of an order, oldest first
    pub async fn transitions(&self, order_no: &OrderNo) -> Result<Vec<StatusTransition>, WorkflowError> {
        Ok(self.orders.transitions(order_no).await?)
    }

    /// Orders whose number was issued on `date`
    pub async fn orders_created_on(&self, date: NaiveDate) -> Result<u32, WorkflowError> {
        Ok(self.orders.count_created_on(date).await?)
    }

    /// Start a process-local counter after the orders already stored for `date`
    pub async fn seed_sequence(&self, generator: &InMemorySequenceGenerator, date: NaiveDate) -> Result<u32, WorkflowError> {
        let issued = self.orders_created_on(date).await?;
        generator.seed(date, issued).await;
        tracing::info!(date = %date, issued, "Order sequence seeded");
        Ok(issued)
    }

    /// Price records for a product in a region, newest effective time first
    pub async fn history(&self, product_code: &str, region_code: &str) -> Vec<PriceHistory> {
        tracing::debug!(product_code = %product_code, region = %region_code, "Querying price history");
        self.ledger.history(product_code, region_code).await
    }

    pub async fn current_price(&self, product_code: &str, region_code: &str, at: DateTime<Utc>) -> Decimal {
        self.ledger.current_price(product_code, region_code, at).await
    }

    pub async fn store_price_at(
        &self,
        product_code: &str,
        region_code: &str,
        store_id: StoreId,
        at: DateTime<Utc>,
    ) -> Decimal {
        self.ledger.store_price_at(product_code, region_code, store_id, at).await
    }

    async fn transition(&self, order_no: &OrderNo, command: PriceChangeCommand) -> Result<PriceChangeOrder, WorkflowError> {
        let order = self.orders.handle(order_no, command, Uuid::new_v4()).await?;
        self.metrics.record_transition(order.status.name());
        Ok(order)
    }
}
