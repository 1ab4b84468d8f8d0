use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::domain::price_change::OrderNo;
use super::{order_no, SequenceError, SequenceGenerator};

/// Process-local per-day counter
#[derive(Default)]
pub struct InMemorySequenceGenerator {
    counters: Mutex<HashMap<NaiveDate, u32>>,
}

impl InMemorySequenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue numbering after `issued` orders already created on `date`.
    /// Never moves a counter backwards.
    pub async fn seed(&self, date: NaiveDate, issued: u32) {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(date).or_insert(0);
        *counter = (*counter).max(issued);
    }
}

#[async_trait]
impl SequenceGenerator for InMemorySequenceGenerator {
    async fn next(&self, date: NaiveDate) -> Result<OrderNo, SequenceError> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(date).or_insert(0);

        if *counter >= OrderNo::MAX_SEQUENCE {
            return Err(SequenceError::Exhausted { date, value: *counter + 1 });
        }
        *counter += 1;

        order_no(date, *counter)
    }
}
