use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::domain::price_change::OrderNo;

mod memory;
mod redis_counter;

pub use memory::InMemorySequenceGenerator;
pub use redis_counter::RedisSequenceGenerator;

// ============================================================================
// Order Number Sequencing
// ============================================================================
//
// One counter per calendar day (UTC). Reservation is a single atomic
// increment, so concurrent creators never observe the same value.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("Order sequence for {date} exhausted (next value {value} exceeds {max})", max = OrderNo::MAX_SEQUENCE)]
    Exhausted { date: NaiveDate, value: u32 },

    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),
}

#[async_trait]
pub trait SequenceGenerator: Send + Sync {
    /// Reserve the next order number for `date`
    async fn next(&self, date: NaiveDate) -> Result<OrderNo, SequenceError>;
}

/// Calendar day used for new order numbers
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn order_no(date: NaiveDate, value: u32) -> Result<OrderNo, SequenceError> {
    OrderNo::new(date, value).map_err(|_| SequenceError::Exhausted { date, value })
}
