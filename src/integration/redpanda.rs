use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};

use crate::domain::price_change::PriceChangeOrder;
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
use super::notification::{Notifier, PriceChangeNotification};

// ============================================================================
// Redpanda Notifier - JSON notifications on a Kafka-compatible topic
// ============================================================================
//
// Messages are keyed by order number so all notifications of one order land
// on the same partition. A circuit breaker stops hammering the broker while
// it is down; callers see an error either way and carry on.
//
// ============================================================================

pub struct RedpandaNotifier {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
    circuit_breaker: CircuitBreaker,
}

impl RedpandaNotifier {
    pub fn new(brokers: &str, topic: impl Into<String>, metrics: Option<Arc<Metrics>>) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| anyhow::anyhow!("Failed to create Redpanda producer: {}", e))?;

        let mut circuit_breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 3,
        });
        if let Some(metrics) = metrics {
            circuit_breaker = circuit_breaker
                .on_transition(move |state| metrics.notifier_circuit_breaker_state.set(state.as_gauge()));
        }

        Ok(Self {
            producer,
            topic: topic.into(),
            send_timeout: Duration::from_secs(5),
            circuit_breaker,
        })
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }

    async fn publish(&self, notification: &PriceChangeNotification) -> anyhow::Result<()> {
        let key = notification.order_no.to_string();
        let payload = serde_json::to_string(notification)?;

        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);
                self.producer
                    .send(record, rdkafka::util::Timeout::After(self.send_timeout))
                    .await
                    .map_err(|(e, _)| anyhow::anyhow!("Kafka send error: {}", e))
            })
            .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    topic = %self.topic,
                    order_no = %key,
                    kind = ?notification.kind,
                    "Published notification to Redpanda"
                );
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(topic = %self.topic, "Circuit breaker open - Redpanda unavailable");
                Err(anyhow::anyhow!("Circuit breaker open for Redpanda"))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, topic = %self.topic, "Failed to publish to Redpanda");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Notifier for RedpandaNotifier {
    async fn notify_success(&self, order: &PriceChangeOrder) -> anyhow::Result<()> {
        self.publish(&PriceChangeNotification::applied(order)).await
    }

    async fn notify_failure(&self, order: &PriceChangeOrder, reason: &str) -> anyhow::Result<()> {
        self.publish(&PriceChangeNotification::failed(order, reason)).await
    }
}
