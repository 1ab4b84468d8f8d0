// ============================================================================
// Integration Layer - collaborators the engine calls out to
// ============================================================================
//
// - Outlet pricing (store POS endpoint) and an in-process simulation
// - Notifications: log-only and Redpanda-backed
//
// ============================================================================

pub mod outlet;
pub mod notification;
pub mod redpanda;

pub use outlet::{OutletCall, OutletError, OutletPricingClient, SimulatedPosClient};
pub use notification::{LoggingNotifier, NotificationKind, Notifier, PriceChangeNotification};
pub use redpanda::RedpandaNotifier;
