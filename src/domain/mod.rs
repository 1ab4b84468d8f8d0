// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// price_change:  the change order, its pricing rules and state machine
// price_history: the versioned ledger of prices per product/region/store
//
// Neither module knows about outlets, notifications or scheduling; the
// execution and workflow layers compose them.
//
// ============================================================================

pub mod price_change;
pub mod price_history;
