use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::MultiplexedConnection;

use crate::domain::price_change::OrderNo;
use super::{order_no, SequenceError, SequenceGenerator};

/// Per-day counter shared by every engine instance: `INCR <prefix>:<YYYYMMDD>`.
/// The key expires after `retention` so old days do not accumulate.
pub struct RedisSequenceGenerator {
    connection: MultiplexedConnection,
    key_prefix: String,
    retention: Duration,
}

impl RedisSequenceGenerator {
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self, SequenceError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;

        tracing::info!(url = %url, "Connected to Redis for order sequencing");

        Ok(Self {
            connection,
            key_prefix: key_prefix.into(),
            retention: Duration::from_secs(3 * 24 * 60 * 60),
        })
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn key(&self, date: NaiveDate) -> String {
        format!("{}:{}", self.key_prefix, date.format("%Y%m%d"))
    }
}

#[async_trait]
impl SequenceGenerator for RedisSequenceGenerator {
    async fn next(&self, date: NaiveDate) -> Result<OrderNo, SequenceError> {
        let key = self.key(date);
        let mut connection = self.connection.clone();

        let (value,): (u32,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, self.retention.as_secs() as i64)
            .ignore()
            .query_async(&mut connection)
            .await?;

        tracing::debug!(key = %key, value = value, "Reserved order sequence");

        order_no(date, value)
    }
}
