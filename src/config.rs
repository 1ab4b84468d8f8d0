use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::price_change::PricingPolicy;
use crate::execution::ExecutionConfig;

// ============================================================================
// Engine Configuration
// ============================================================================
//
// Environment variables (all optional):
//
//   PRICING_MAX_ADJUSTMENT        single-change cap            (10.00)
//   PRICING_MAX_DECREASE_RATIO    max decrease / original      (0.30)
//   PRICING_FALLBACK_BASE_PRICE   price when no history exists (36.00)
//   OUTLET_TIMEOUT_MS             per-outlet call timeout      (5000)
//   BATCH_DEADLINE_MS             whole propagation deadline   (120000)
//   OUTLET_MAX_CONCURRENCY        parallel outlet updates      (1)
//   OUTLET_MAX_ATTEMPTS           attempts per outlet          (1)
//   NOTIFY_TIMEOUT_MS             notifier call timeout        (5000)
//   METRICS_PORT                  /metrics listener            (9090)
//   REDIS_URL                     shared sequence counter      (unset: in-memory)
//   KAFKA_BROKERS                 notification bus             (unset: log only)
//   NOTIFICATION_TOPIC            notification topic           (price-change-notification)
//
// ============================================================================

pub const DEFAULT_NOTIFICATION_TOPIC: &str = "price-change-notification";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub policy: PricingPolicy,
    pub fallback_base_price: Decimal,
    pub execution: ExecutionConfig,
    pub metrics_port: u16,
    pub redis_url: Option<String>,
    pub kafka_brokers: Option<String>,
    pub notification_topic: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: PricingPolicy::default(),
            fallback_base_price: dec!(36.00),
            execution: ExecutionConfig::default(),
            metrics_port: 9090,
            redis_url: None,
            kafka_brokers: None,
            notification_topic: DEFAULT_NOTIFICATION_TOPIC.to_string(),
        }
    }
}

impl EngineConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep
    /// their defaults, malformed ones are an error
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let millis = |name: &str, default: Duration| -> Result<Duration> {
            Ok(Duration::from_millis(parse(&lookup, name, whole_millis(name, default)?)?))
        };

        let config = Self {
            policy: PricingPolicy {
                max_adjustment: parse(&lookup, "PRICING_MAX_ADJUSTMENT", defaults.policy.max_adjustment)?,
                max_decrease_ratio: parse(&lookup, "PRICING_MAX_DECREASE_RATIO", defaults.policy.max_decrease_ratio)?,
            },
            fallback_base_price: parse(&lookup, "PRICING_FALLBACK_BASE_PRICE", defaults.fallback_base_price)?,
            execution: ExecutionConfig {
                outlet_timeout: millis("OUTLET_TIMEOUT_MS", defaults.execution.outlet_timeout)?,
                batch_deadline: millis("BATCH_DEADLINE_MS", defaults.execution.batch_deadline)?,
                max_concurrency: parse(&lookup, "OUTLET_MAX_CONCURRENCY", defaults.execution.max_concurrency)?,
                outlet_attempts: parse(&lookup, "OUTLET_MAX_ATTEMPTS", defaults.execution.outlet_attempts)?,
                notify_timeout: millis("NOTIFY_TIMEOUT_MS", defaults.execution.notify_timeout)?,
            },
            metrics_port: parse(&lookup, "METRICS_PORT", defaults.metrics_port)?,
            redis_url: non_blank(lookup("REDIS_URL")),
            kafka_brokers: non_blank(lookup("KAFKA_BROKERS")),
            notification_topic: non_blank(lookup("NOTIFICATION_TOPIC")).unwrap_or(defaults.notification_topic),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.policy.max_adjustment <= Decimal::ZERO {
            bail!("PRICING_MAX_ADJUSTMENT must be positive");
        }
        if self.policy.max_decrease_ratio <= Decimal::ZERO || self.policy.max_decrease_ratio > Decimal::ONE {
            bail!("PRICING_MAX_DECREASE_RATIO must be in (0, 1]");
        }
        if self.fallback_base_price <= Decimal::ZERO {
            bail!("PRICING_FALLBACK_BASE_PRICE must be positive");
        }
        if self.execution.max_concurrency == 0 {
            bail!("OUTLET_MAX_CONCURRENCY must be at least 1");
        }
        if self.execution.outlet_attempts == 0 {
            bail!("OUTLET_MAX_ATTEMPTS must be at least 1");
        }
        if self.execution.outlet_timeout.is_zero() || self.execution.batch_deadline.is_zero() {
            bail!("Outlet timeout and batch deadline must be non-zero");
        }
        Ok(())
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_blank(lookup(name)) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        None => Ok(default),
    }
}

fn whole_millis(name: &str, duration: Duration) -> Result<u64> {
    u64::try_from(duration.as_millis()).with_context(|| format!("Default for {} does not fit in milliseconds", name))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.policy.max_adjustment, dec!(10.00));
        assert_eq!(config.fallback_base_price, dec!(36.00));
        assert_eq!(config.execution.max_concurrency, 1);
        assert_eq!(config.execution.outlet_attempts, 1);
        assert_eq!(config.notification_topic, "price-change-notification");
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PRICING_MAX_ADJUSTMENT", "5.50"),
            ("OUTLET_TIMEOUT_MS", "250"),
            ("OUTLET_MAX_CONCURRENCY", "8"),
            ("REDIS_URL", "redis://127.0.0.1:6379"),
            ("KAFKA_BROKERS", "  "),
        ]))
        .unwrap();

        assert_eq!(config.policy.max_adjustment, dec!(5.50));
        assert_eq!(config.execution.outlet_timeout, Duration::from_millis(250));
        assert_eq!(config.execution.max_concurrency, 8);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.kafka_brokers, None);
    }

    #[test]
    fn test_malformed_value_is_an_error() {
        let err = EngineConfig::from_lookup(lookup(&[("METRICS_PORT", "ninety")])).unwrap_err();
        assert!(err.to_string().contains("METRICS_PORT"));
    }

    #[test]
    fn test_millisecond_defaults_are_range_checked() {
        assert_eq!(whole_millis("OUTLET_TIMEOUT_MS", Duration::from_secs(5)).unwrap(), 5000);
        let err = whole_millis("BATCH_DEADLINE_MS", Duration::MAX).unwrap_err();
        assert!(err.to_string().contains("BATCH_DEADLINE_MS"));
    }

    #[test]
    fn test_validation() {
        assert!(EngineConfig::from_lookup(lookup(&[("OUTLET_MAX_CONCURRENCY", "0")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("PRICING_MAX_DECREASE_RATIO", "1.5")])).is_err());
    }
}
