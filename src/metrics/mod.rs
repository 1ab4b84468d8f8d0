mod server;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the price change engine
// ============================================================================
//
// - Order lifecycle (created, rejected by policy, transitions)
// - Execution outcomes and batch duration
// - Per-outlet updates, retries and rollbacks
// - Notification delivery and notifier circuit breaker state
//
// Scraped via /metrics on the metrics server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order lifecycle
    pub orders_created: IntCounter,
    pub orders_rejected: IntCounterVec,
    pub transitions: IntCounterVec,

    // Execution
    pub executions: IntCounterVec,
    pub execution_duration: Histogram,

    // Outlets
    pub outlet_updates: IntCounterVec,
    pub outlet_retry_attempts: IntCounterVec,
    pub outlet_rollbacks: IntCounterVec,

    // Notifications
    pub notifications: IntCounterVec,
    pub notifier_circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new(
            "price_change_orders_created_total",
            "Price change orders accepted in PENDING_APPROVAL",
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        let orders_rejected = IntCounterVec::new(
            Opts::new("price_change_orders_rejected_total", "Orders rejected at creation"),
            &["reason"],
        )?;
        registry.register(Box::new(orders_rejected.clone()))?;

        let transitions = IntCounterVec::new(
            Opts::new("price_change_transitions_total", "Order status transitions"),
            &["to_status"],
        )?;
        registry.register(Box::new(transitions.clone()))?;

        let executions = IntCounterVec::new(
            Opts::new("price_change_executions_total", "Finished executions by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(executions.clone()))?;

        let execution_duration = Histogram::with_opts(
            HistogramOpts::new(
                "price_change_execution_duration_seconds",
                "Wall time of one execution including rollback",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        )?;
        registry.register(Box::new(execution_duration.clone()))?;

        let outlet_updates = IntCounterVec::new(
            Opts::new("outlet_updates_total", "Outlet price updates by result"),
            &["result"],
        )?;
        registry.register(Box::new(outlet_updates.clone()))?;

        let outlet_retry_attempts = IntCounterVec::new(
            Opts::new("outlet_retry_attempts_total", "Outlet update retries"),
            &["attempt"],
        )?;
        registry.register(Box::new(outlet_retry_attempts.clone()))?;

        let outlet_rollbacks = IntCounterVec::new(
            Opts::new("outlet_rollbacks_total", "Outlet price restorations by result"),
            &["result"],
        )?;
        registry.register(Box::new(outlet_rollbacks.clone()))?;

        let notifications = IntCounterVec::new(
            Opts::new("notifications_total", "Notifications sent"),
            &["kind", "result"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        let notifier_circuit_breaker_state = IntGauge::new(
            "notifier_circuit_breaker_state",
            "Notifier circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(notifier_circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            orders_rejected,
            transitions,
            executions,
            execution_duration,
            outlet_updates,
            outlet_retry_attempts,
            outlet_rollbacks,
            notifications,
            notifier_circuit_breaker_state,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_rejection(&self, reason: &str) {
        self.orders_rejected.with_label_values(&[reason]).inc();
    }

    pub fn record_transition(&self, to_status: &str) {
        self.transitions.with_label_values(&[to_status]).inc();
    }

    pub fn record_execution(&self, completed: bool, duration_secs: f64) {
        let outcome = if completed { "completed" } else { "failed" };
        self.executions.with_label_values(&[outcome]).inc();
        self.execution_duration.observe(duration_secs);
    }

    pub fn record_outlet_update(&self, result: &str) {
        self.outlet_updates.with_label_values(&[result]).inc();
    }

    pub fn record_outlet_retry(&self, attempt: u32) {
        self.outlet_retry_attempts.with_label_values(&[&attempt.to_string()]).inc();
    }

    pub fn record_rollback(&self, restored: bool) {
        let result = if restored { "restored" } else { "failed" };
        self.outlet_rollbacks.with_label_values(&[result]).inc();
    }

    pub fn record_notification(&self, kind: &str, delivered: bool) {
        let result = if delivered { "delivered" } else { "failed" };
        self.notifications.with_label_values(&[kind, result]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        metrics
            .registry
            .gather()
            .into_iter()
            .find(|family| family.name() == name)?
            .metric
            .iter()
            .find(|m| {
                labels
                    .iter()
                    .all(|(k, v)| m.label.iter().any(|l| l.name() == *k && l.value() == *v))
            })
            .and_then(|m| m.counter.value)
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_created.inc();
        assert!(!metrics.registry().gather().is_empty());
        assert_eq!(counter_value(&metrics, "price_change_orders_created_total", &[]), Some(1.0));
    }

    #[test]
    fn test_labelled_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_outlet_update("success");
        metrics.record_outlet_update("success");
        metrics.record_outlet_update("timeout");
        metrics.record_notification("failure", false);

        assert_eq!(counter_value(&metrics, "outlet_updates_total", &[("result", "success")]), Some(2.0));
        assert_eq!(counter_value(&metrics, "outlet_updates_total", &[("result", "timeout")]), Some(1.0));
        assert_eq!(
            counter_value(&metrics, "notifications_total", &[("kind", "failure"), ("result", "failed")]),
            Some(1.0)
        );
    }

    #[test]
    fn test_execution_histogram() {
        let metrics = Metrics::new().unwrap();
        metrics.record_execution(true, 0.2);
        metrics.record_execution(false, 1.5);
        assert_eq!(metrics.execution_duration.get_sample_count(), 2);
        assert_eq!(counter_value(&metrics, "price_change_executions_total", &[("outcome", "failed")]), Some(1.0));
    }
}
