// ============================================================================
// Price History Domain - versioned price ledger
// ============================================================================
//
// - Value objects (ChangeType, LedgerKey)
// - Record (PriceHistory interval, PriceEntry input)
// - Ledger (PriceHistoryLedger with per-key serialization)
//
// ============================================================================

pub mod value_objects;
pub mod record;
pub mod ledger;

pub use value_objects::*;
pub use record::*;
pub use ledger::*;
