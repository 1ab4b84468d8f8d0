use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::price_change::{OrderNo, StoreId};
use super::value_objects::{ChangeType, LedgerKey};

// ============================================================================
// Price History Record - one versioned interval of a price
// ============================================================================
//
// Valid over the half-open interval [effective_time, expiry_time).
// `expiry_time = None` means the record is still current.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: u64,
    pub change_order_no: Option<OrderNo>,

    pub product_code: String,
    pub product_name: String,
    pub region_code: String,
    pub store_id: Option<StoreId>,
    pub store_name: Option<String>,

    pub original_price: Decimal,
    pub new_price: Decimal,
    pub price_difference: Decimal,
    pub adjustment_percentage: Decimal,

    pub effective_time: DateTime<Utc>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub is_active: bool,

    pub change_type: ChangeType,
    pub change_reason: Option<String>,
    pub created_by: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub remark: Option<String>,
}

impl PriceHistory {
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(&self.product_code, &self.region_code, self.store_id)
    }

    /// Whether `at` falls inside [effective_time, expiry_time)
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        self.effective_time <= at && self.expiry_time.map_or(true, |end| at < end)
    }

    pub fn overlaps(&self, other: &PriceHistory) -> bool {
        let self_before_other = self.expiry_time.map_or(false, |end| end <= other.effective_time);
        let other_before_self = other.expiry_time.map_or(false, |end| end <= self.effective_time);
        let empty = |r: &PriceHistory| r.expiry_time == Some(r.effective_time);
        !(self_before_other || other_before_self || empty(self) || empty(other))
    }

    /// Close the interval at `at`
    pub fn expire(&mut self, at: DateTime<Utc>) {
        self.expiry_time = Some(at);
        self.is_active = false;
    }

    /// Human-readable summary, e.g. "from 36.00 raised to 38.00 (+5.56%)"
    pub fn describe(&self) -> String {
        let from = two_places(self.original_price);
        let to = two_places(self.new_price);
        let pct = two_places(self.adjustment_percentage);

        if self.new_price > self.original_price {
            format!("from {} raised to {} (+{}%)", from, to, pct)
        } else if self.new_price < self.original_price {
            format!("from {} lowered to {} ({}%)", from, to, pct)
        } else {
            format!("unchanged at {}", to)
        }
    }
}

fn two_places(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Input for `PriceHistoryLedger::record`. Id, derived amounts and the
/// interval end are assigned by the ledger.
#[derive(Debug, Clone)]
pub struct PriceEntry {
    pub change_order_no: Option<OrderNo>,
    pub product_code: String,
    pub product_name: String,
    pub region_code: String,
    pub store_id: Option<StoreId>,
    pub store_name: Option<String>,
    pub original_price: Decimal,
    pub new_price: Decimal,
    pub effective_time: DateTime<Utc>,
    pub change_type: ChangeType,
    pub change_reason: Option<String>,
    pub created_by: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub remark: Option<String>,
}

impl PriceEntry {
    pub fn new(
        product_code: impl Into<String>,
        region_code: impl Into<String>,
        original_price: Decimal,
        new_price: Decimal,
        effective_time: DateTime<Utc>,
        change_type: ChangeType,
    ) -> Self {
        let product_code = product_code.into();
        Self {
            change_order_no: None,
            product_name: product_code.clone(),
            product_code,
            region_code: region_code.into(),
            store_id: None,
            store_name: None,
            original_price,
            new_price,
            effective_time,
            change_type,
            change_reason: None,
            created_by: "system".to_string(),
            approved_by: None,
            approved_at: None,
            remark: None,
        }
    }

    pub fn for_store(mut self, store_id: StoreId) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn with_order(mut self, order_no: OrderNo) -> Self {
        self.change_order_no = Some(order_no);
        self
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = name.into();
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.change_reason = Some(reason.into());
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }

    pub fn approved(mut self, approver: Option<String>, approved_at: Option<DateTime<Utc>>) -> Self {
        self.approved_by = approver;
        self.approved_at = approved_at;
        self
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(&self.product_code, &self.region_code, self.store_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn record(original: Decimal, new: Decimal, pct: Decimal) -> PriceHistory {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        PriceHistory {
            id: 1,
            change_order_no: None,
            product_code: "LATTE".into(),
            product_name: "Latte".into(),
            region_code: "EAST".into(),
            store_id: None,
            store_name: None,
            original_price: original,
            new_price: new,
            price_difference: new - original,
            adjustment_percentage: pct,
            effective_time: t,
            expiry_time: None,
            is_active: true,
            change_type: ChangeType::MarketAdjustment,
            change_reason: None,
            created_by: "system".into(),
            approved_by: None,
            approved_at: None,
            created_at: t,
            remark: None,
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            record(dec!(36.00), dec!(38.00), dec!(5.5556)).describe(),
            "from 36.00 raised to 38.00 (+5.56%)"
        );
        assert_eq!(
            record(dec!(36), dec!(34), dec!(-5.5556)).describe(),
            "from 36.00 lowered to 34.00 (-5.56%)"
        );
        assert_eq!(record(dec!(36), dec!(36), Decimal::ZERO).describe(), "unchanged at 36.00");
    }

    #[test]
    fn test_interval_is_half_open() {
        let mut r = record(dec!(36), dec!(38), dec!(5.5556));
        let start = r.effective_time;
        let end = start + Duration::hours(1);
        r.expire(end);

        assert!(!r.is_active);
        assert!(r.is_effective_at(start));
        assert!(r.is_effective_at(end - Duration::seconds(1)));
        assert!(!r.is_effective_at(end));
        assert!(!r.is_effective_at(start - Duration::seconds(1)));
    }

    #[test]
    fn test_overlap() {
        let mut a = record(dec!(36), dec!(38), dec!(5.5556));
        let mut b = record(dec!(38), dec!(37), dec!(-2.6316));
        b.effective_time = a.effective_time + Duration::hours(1);
        assert!(a.overlaps(&b));

        a.expire(b.effective_time);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }
}
