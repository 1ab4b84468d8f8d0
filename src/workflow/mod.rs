// ============================================================================
// Workflow - caller-facing orchestration of change orders
// ============================================================================

pub mod errors;
pub mod pricing;
pub mod requests;

pub use errors::WorkflowError;
pub use pricing::PricingWorkflow;
pub use requests::{
    BatchCreation, BatchPriceChangeRequest, BatchRejection, PriceChangeRequest, ProductInfo, RegionalPrice,
};
