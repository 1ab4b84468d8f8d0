// ============================================================================
// Price Change Engine
// ============================================================================
//
// domain       order state machine, pricing policy, price-history ledger
// sequence     daily order numbering (in-memory or Redis)
// execution    fail-fast propagation to outlets and rollback
// workflow     create / approve / execute / cancel entry point
// integration  outlet POS client and change notifications
// metrics      Prometheus registry and /metrics server
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod execution;
pub mod integration;
pub mod metrics;
pub mod sequence;
pub mod utils;
pub mod workflow;
