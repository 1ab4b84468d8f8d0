use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::event_sourcing::{Aggregate, EventEnvelope, EventStore};

use super::aggregate::PriceChangeOrder;
use super::commands::{CreatePriceChange, PriceChangeCommand};
use super::errors::PriceChangeError;
use super::events::PriceChangeEvent;
use super::value_objects::{OrderNo, OrderStatus};

// ============================================================================
// Price Change Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Event Store
//
// The expected-version check in the store serializes writers on one order.
// A writer that loses the race reloads and re-validates, so the loser of
// two concurrent approvals sees InvalidStateTransition, not a conflict.
//
// ============================================================================

const MAX_CONFLICT_RETRIES: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Domain(#[from] PriceChangeError),

    #[error("Price change order not found: {0}")]
    NotFound(String),

    #[error("Price change order already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// One entry of an order's transition log
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub sequence: i64,
    pub at: DateTime<Utc>,
    pub actor: Option<String>,
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub event_type: String,
}

pub struct PriceChangeCommandHandler {
    event_store: Arc<EventStore<PriceChangeEvent>>,
}

impl PriceChangeCommandHandler {
    pub fn new(event_store: Arc<EventStore<PriceChangeEvent>>) -> Self {
        Self { event_store }
    }

    /// Open a new order stream. Fails if the order number is taken.
    pub async fn create(
        &self,
        command: CreatePriceChange,
        correlation_id: Uuid,
    ) -> Result<PriceChangeOrder, CommandError> {
        let event = PriceChangeOrder::open(&command)?;
        let order = PriceChangeOrder::apply_first_event(&event)?;
        let order_no = order.order_no.to_string();

        let envelope = EventEnvelope::new(&order_no, 1, event.event_type(), event, correlation_id)
            .with_actor(command.created_by.as_str())
            .with_metadata("to_status", order.status.name());

        // expected version 0: the stream must not exist yet
        if let Err(e) = self.event_store.append_events(&order_no, 0, vec![envelope]).await {
            if self.event_store.aggregate_exists(&order_no).await? {
                return Err(CommandError::AlreadyExists(order_no));
            }
            return Err(CommandError::Store(e));
        }

        tracing::info!(
            order_no = %order_no,
            product_code = %order.product_code,
            new_price = %order.new_price,
            stores = order.affected_store_count(),
            "Price change order created"
        );

        Ok(order)
    }

    /// Apply a command to an existing order and persist the resulting events
    pub async fn handle(
        &self,
        order_no: &OrderNo,
        command: PriceChangeCommand,
        correlation_id: Uuid,
    ) -> Result<PriceChangeOrder, CommandError> {
        let aggregate_id = order_no.to_string();

        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let order = self.load(order_no).await?;
            let expected_version = order.version();

            let domain_events = order.handle_command(&command)?;

            let mut next = order.clone();
            let mut envelopes = Vec::with_capacity(domain_events.len());
            for (offset, domain_event) in domain_events.into_iter().enumerate() {
                let from = next.status.name();
                next.apply_event(&domain_event)?;

                let mut envelope = EventEnvelope::new(
                    &aggregate_id,
                    expected_version + offset as i64 + 1,
                    domain_event.event_type(),
                    domain_event.clone(),
                    correlation_id,
                )
                .with_metadata("from_status", from)
                .with_metadata("to_status", next.status.name());
                if let Some(actor) = domain_event.actor() {
                    envelope = envelope.with_actor(actor);
                }
                envelopes.push(envelope);
            }

            match self.event_store.append_events(&aggregate_id, expected_version, envelopes).await {
                Ok(_) => {
                    tracing::debug!(
                        order_no = %aggregate_id,
                        action = command.action(),
                        from = %order.status,
                        to = %next.status,
                        "Order transitioned"
                    );
                    return Ok(next);
                }
                Err(e) => {
                    let current = self.event_store.get_current_version(&aggregate_id).await?;
                    if current == expected_version || attempt == MAX_CONFLICT_RETRIES {
                        return Err(CommandError::Store(e));
                    }
                    tracing::debug!(
                        order_no = %aggregate_id,
                        attempt = attempt,
                        "Concurrent write detected, re-validating command"
                    );
                }
            }
        }

        Err(CommandError::Store(anyhow::anyhow!(
            "Gave up on {} after {} conflicting writes",
            aggregate_id,
            MAX_CONFLICT_RETRIES
        )))
    }

    pub async fn load(&self, order_no: &OrderNo) -> Result<PriceChangeOrder, CommandError> {
        self.event_store
            .load_aggregate::<PriceChangeOrder>(&order_no.to_string())
            .await?
            .ok_or_else(|| CommandError::NotFound(order_no.to_string()))
    }

    /// Append-only status log of an order, oldest first
    pub async fn transitions(&self, order_no: &OrderNo) -> Result<Vec<StatusTransition>, CommandError> {
        let events = self.event_store.load_events(&order_no.to_string()).await?;

        let mut iter = events.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| CommandError::NotFound(order_no.to_string()))?;

        let mut order = PriceChangeOrder::apply_first_event(&first.event_data)?;
        let mut log = vec![StatusTransition {
            sequence: first.sequence_number,
            at: first.timestamp,
            actor: first.actor,
            from: None,
            to: order.status.clone(),
            event_type: first.event_type,
        }];

        for envelope in iter {
            let from = order.status.clone();
            order.apply_event(&envelope.event_data)?;
            log.push(StatusTransition {
                sequence: envelope.sequence_number,
                at: envelope.timestamp,
                actor: envelope.actor,
                from: Some(from),
                to: order.status.clone(),
                event_type: envelope.event_type,
            });
        }

        Ok(log)
    }

    /// Number of orders whose number was issued on `date`
    pub async fn count_created_on(&self, date: NaiveDate) -> Result<u32, CommandError> {
        let ids = self.event_store.aggregate_ids().await?;
        let count = ids
            .iter()
            .filter_map(|id| id.parse::<OrderNo>().ok())
            .filter(|no| no.date() == date)
            .count();
        Ok(count as u32)
    }
}
