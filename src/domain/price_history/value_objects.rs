use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::price_change::StoreId;

/// Why a ledger record was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    MarketAdjustment,
    CostChange,
    Promotion,
    Seasonal,
    Competitive,
    Rollback,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::MarketAdjustment => "MARKET_ADJUSTMENT",
            ChangeType::CostChange => "COST_CHANGE",
            ChangeType::Promotion => "PROMOTION",
            ChangeType::Seasonal => "SEASONAL",
            ChangeType::Competitive => "COMPETITIVE",
            ChangeType::Rollback => "ROLLBACK",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Versioning key: at most one record per key is effective at any instant.
/// `store_id = None` is a region-wide price.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerKey {
    pub product_code: String,
    pub region_code: String,
    pub store_id: Option<StoreId>,
}

impl LedgerKey {
    pub fn new(product_code: impl Into<String>, region_code: impl Into<String>, store_id: Option<StoreId>) -> Self {
        Self {
            product_code: product_code.into(),
            region_code: region_code.into(),
            store_id,
        }
    }

    pub fn matches(&self, product_code: &str, region_code: &str) -> bool {
        self.product_code == product_code && self.region_code == region_code
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.store_id {
            Some(store) => write!(f, "{}/{}/{}", self.product_code, self.region_code, store),
            None => write!(f, "{}/{}/*", self.product_code, self.region_code),
        }
    }
}
