// ============================================================================
// Price Change Domain - the change order and its lifecycle
// ============================================================================
//
// - Value objects (StoreId, AdjustmentType, OrderStatus, OrderNo)
// - Pricing policy (caps and limits checked at creation)
// - Events and commands
// - Errors (PriceChangeError)
// - Aggregate (PriceChangeOrder state machine)
// - Command handler (PriceChangeCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod policy;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

pub use value_objects::*;
pub use policy::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
