use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::RetryConfig;

// ============================================================================
// Execution Layer - propagation of an approved order to its outlets
// ============================================================================
//
// BatchExecutor:       fail-fast fan-out; first outlet failure stops new
//                      updates, in-flight ones finish and are tallied
// RollbackCoordinator: best-effort restoration of the outlets that were
//                      updated; a failing restoration is logged and skipped
//
// ============================================================================

pub mod batch;
pub mod rollback;

pub use batch::{BatchExecutor, ExecutionOutcome, OutletFailure, PropagationReport, StoreFailure};
pub use rollback::{RollbackCoordinator, RollbackReport, RollbackTarget};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Bound on a single outlet call (per attempt)
    pub outlet_timeout: Duration,
    /// No new outlet update starts after this much time has passed
    pub batch_deadline: Duration,
    /// Outlet updates in flight at once; 1 keeps list order strictly
    pub max_concurrency: usize,
    /// Attempts per outlet; only transient errors are retried
    pub outlet_attempts: u32,
    pub notify_timeout: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            outlet_timeout: Duration::from_secs(5),
            batch_deadline: Duration::from_secs(120),
            max_concurrency: 1,
            outlet_attempts: 1,
            notify_timeout: Duration::from_secs(5),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl ExecutionConfig {
    pub fn outlet_retry(&self) -> RetryConfig {
        RetryConfig::default().with_max_attempts(self.outlet_attempts)
    }
}
