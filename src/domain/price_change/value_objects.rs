use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Price Change Value Objects
// ============================================================================

/// Identifier of a physical outlet (store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StoreId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// How the submitted amount moves the price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    Increase,
    Decrease,
    /// The amount is the new price itself
    Fixed,
}

impl AdjustmentType {
    pub fn apply(&self, original_price: Decimal, amount: Decimal) -> Decimal {
        match self {
            AdjustmentType::Increase => original_price + amount,
            AdjustmentType::Decrease => original_price - amount.abs(),
            AdjustmentType::Fixed => amount,
        }
    }
}

/// Lifecycle of a change order.
///
/// ```text
/// PENDING_APPROVAL → APPROVED → EXECUTING → COMPLETED
///        │               │             ↘ FAILED(reason)
///        └───────────────┴──→ CANCELLED
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingApproval,
    Approved,
    Executing,
    Completed,
    Failed { reason: String },
    Cancelled { reason: Option<String> },
}

impl OrderStatus {
    pub fn name(&self) -> &'static str {
        match self {
            OrderStatus::PendingApproval => "PENDING_APPROVAL",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Executing => "EXECUTING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Failed { .. } => "FAILED",
            OrderStatus::Cancelled { .. } => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed { .. } | OrderStatus::Cancelled { .. }
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Order Number - PCO-YYYYMMDD-NNN
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OrderNoError {
    #[error("Malformed order number: {0}")]
    Malformed(String),

    #[error("Daily sequence {0} is outside 1..=999")]
    SequenceOutOfRange(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNo {
    date: NaiveDate,
    sequence: u16,
}

impl OrderNo {
    pub const PREFIX: &'static str = "PCO";
    pub const MAX_SEQUENCE: u32 = 999;

    pub fn new(date: NaiveDate, sequence: u32) -> Result<Self, OrderNoError> {
        if sequence == 0 || sequence > Self::MAX_SEQUENCE {
            return Err(OrderNoError::SequenceOutOfRange(sequence));
        }
        Ok(Self { date, sequence: sequence as u16 })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn sequence(&self) -> u32 {
        self.sequence as u32
    }
}

impl fmt::Display for OrderNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:03}", Self::PREFIX, self.date.format("%Y%m%d"), self.sequence)
    }
}

impl FromStr for OrderNo {
    type Err = OrderNoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || OrderNoError::Malformed(s.to_string());

        let rest = s
            .strip_prefix(Self::PREFIX)
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(malformed)?;
        let (date_part, seq_part) = rest.split_once('-').ok_or_else(malformed)?;

        let all_digits = |p: &str, len: usize| p.len() == len && p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(date_part, 8) || !all_digits(seq_part, 3) {
            return Err(malformed());
        }

        let date = NaiveDate::parse_from_str(date_part, "%Y%m%d").map_err(|_| malformed())?;
        let sequence: u32 = seq_part.parse().map_err(|_| malformed())?;

        Self::new(date, sequence)
    }
}

impl TryFrom<String> for OrderNo {
    type Error = OrderNoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderNo> for String {
    fn from(value: OrderNo) -> Self {
        value.to_string()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
