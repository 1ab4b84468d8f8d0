use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};

use crate::domain::price_change::{adjustment_percentage, StoreId};
use super::record::{PriceEntry, PriceHistory};
use super::value_objects::LedgerKey;

// ============================================================================
// Price History Ledger - interval-versioned prices
// ============================================================================
//
// Records are partitioned by (product, region, store). Each partition has
// its own lock: expiring the active record and appending its successor is
// one critical section per key, while writes to different keys run in
// parallel.
//
// A partition is kept in effective-time order and its records form
// contiguous, non-overlapping intervals. An entry dated before the active
// record is slotted in between its neighbours: it closes its predecessor
// and expires where its successor begins.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Recorded price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("Product code and region code are required")]
    MissingKey,
}

type Partition = Arc<Mutex<Vec<PriceHistory>>>;

pub struct PriceHistoryLedger {
    partitions: RwLock<HashMap<LedgerKey, Partition>>,
    next_id: AtomicU64,
    fallback_price: Decimal,
}

impl PriceHistoryLedger {
    pub fn new(fallback_price: Decimal) -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fallback_price,
        }
    }

    pub fn fallback_price(&self) -> Decimal {
        self.fallback_price
    }

    /// Insert a record, closing the record it supersedes at the new
    /// record's effective time
    pub async fn record(&self, entry: PriceEntry) -> Result<PriceHistory, LedgerError> {
        if entry.product_code.trim().is_empty() || entry.region_code.trim().is_empty() {
            return Err(LedgerError::MissingKey);
        }
        if entry.new_price <= Decimal::ZERO {
            return Err(LedgerError::NonPositivePrice(entry.new_price));
        }

        let key = entry.key();
        let partition = self.partition(&key).await;
        let mut records = partition.lock().await;

        let position = records.partition_point(|r| r.effective_time <= entry.effective_time);
        let expiry_time = records.get(position).map(|next| next.effective_time);

        if position > 0 {
            let previous = &mut records[position - 1];
            previous.expire(entry.effective_time);
            tracing::debug!(
                key = %key,
                superseded_id = previous.id,
                expiry_time = %entry.effective_time,
                "Expired superseded price record"
            );
        }
        if let Some(expiry) = expiry_time {
            tracing::debug!(
                key = %key,
                effective_time = %entry.effective_time,
                expiry_time = %expiry,
                "Backdated entry inserted before a later record"
            );
        }

        let record = PriceHistory {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            change_order_no: entry.change_order_no,
            product_code: entry.product_code,
            product_name: entry.product_name,
            region_code: entry.region_code,
            store_id: entry.store_id,
            store_name: entry.store_name,
            original_price: entry.original_price,
            new_price: entry.new_price,
            price_difference: entry.new_price - entry.original_price,
            adjustment_percentage: adjustment_percentage(entry.original_price, entry.new_price),
            effective_time: entry.effective_time,
            expiry_time,
            is_active: expiry_time.is_none(),
            change_type: entry.change_type,
            change_reason: entry.change_reason,
            created_by: entry.created_by,
            approved_by: entry.approved_by,
            approved_at: entry.approved_at,
            created_at: Utc::now(),
            remark: entry.remark,
        };

        records.insert(position, record.clone());

        tracing::debug!(
            key = %key,
            id = record.id,
            new_price = %record.new_price,
            change_type = %record.change_type,
            "Recorded price"
        );

        Ok(record)
    }

    /// Region-level price effective at `at`, or the fallback base price
    pub async fn current_price(&self, product_code: &str, region_code: &str, at: DateTime<Utc>) -> Decimal {
        self.price_at(product_code, region_code, at)
            .await
            .map(|r| r.new_price)
            .unwrap_or(self.fallback_price)
    }

    /// Latest record of any store in the region whose interval contains `at`
    pub async fn price_at(&self, product_code: &str, region_code: &str, at: DateTime<Utc>) -> Option<PriceHistory> {
        let partitions = self.matching_partitions(product_code, region_code).await;

        let mut best: Option<PriceHistory> = None;
        for partition in partitions {
            let records = partition.lock().await;
            for record in records.iter().filter(|r| r.is_effective_at(at)) {
                let newer = best
                    .as_ref()
                    .map_or(true, |b| (record.effective_time, record.id) > (b.effective_time, b.id));
                if newer {
                    best = Some(record.clone());
                }
            }
        }
        best
    }

    /// Price at one outlet: its own record, else the region-wide record,
    /// else the fallback base price. Other outlets' records never apply.
    pub async fn store_price_at(
        &self,
        product_code: &str,
        region_code: &str,
        store_id: StoreId,
        at: DateTime<Utc>,
    ) -> Decimal {
        let store_key = LedgerKey::new(product_code, region_code, Some(store_id));
        if let Some(record) = self.effective_record(&store_key, at).await {
            return record.new_price;
        }

        let region_key = LedgerKey::new(product_code, region_code, None);
        self.effective_record(&region_key, at)
            .await
            .map(|r| r.new_price)
            .unwrap_or(self.fallback_price)
    }

    async fn effective_record(&self, key: &LedgerKey, at: DateTime<Utc>) -> Option<PriceHistory> {
        let partition = self.partitions.read().await.get(key).cloned()?;
        let records = partition.lock().await;
        records.iter().rev().find(|r| r.is_effective_at(at)).cloned()
    }

    /// All records for a product in a region, newest effective time first
    pub async fn history(&self, product_code: &str, region_code: &str) -> Vec<PriceHistory> {
        let partitions = self.matching_partitions(product_code, region_code).await;

        let mut all = Vec::new();
        for partition in partitions {
            all.extend(partition.lock().await.iter().cloned());
        }
        all.sort_by(|a, b| {
            b.effective_time
                .cmp(&a.effective_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        all
    }

    /// Records of a single key, oldest first
    pub async fn records_for(&self, key: &LedgerKey) -> Vec<PriceHistory> {
        let partition = self.partitions.read().await.get(key).cloned();
        match partition {
            Some(p) => p.lock().await.clone(),
            None => Vec::new(),
        }
    }

    async fn partition(&self, key: &LedgerKey) -> Partition {
        if let Some(p) = self.partitions.read().await.get(key) {
            return p.clone();
        }
        let mut partitions = self.partitions.write().await;
        partitions.entry(key.clone()).or_default().clone()
    }

    async fn matching_partitions(&self, product_code: &str, region_code: &str) -> Vec<Partition> {
        self.partitions
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.matches(product_code, region_code))
            .map(|(_, p)| p.clone())
            .collect()
    }
}
