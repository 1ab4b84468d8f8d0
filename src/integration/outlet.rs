use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::domain::price_change::StoreId;
use crate::utils::IsTransient;

// ============================================================================
// Outlet Pricing Collaborator - the store POS price endpoint
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OutletError {
    #[error("Store {store_id} rejected price {price} for {product_code}: {message}")]
    Rejected {
        store_id: StoreId,
        product_code: String,
        price: Decimal,
        message: String,
    },

    #[error("Store {store_id} did not answer within {timeout_ms}ms")]
    Timeout { store_id: StoreId, timeout_ms: u64 },

    #[error("Store {store_id} unavailable: {message}")]
    Unavailable { store_id: StoreId, message: String },
}

impl OutletError {
    pub fn kind(&self) -> &'static str {
        match self {
            OutletError::Rejected { .. } => "rejected",
            OutletError::Timeout { .. } => "timeout",
            OutletError::Unavailable { .. } => "unavailable",
        }
    }
}

impl IsTransient for OutletError {
    fn is_transient(&self) -> bool {
        !matches!(self, OutletError::Rejected { .. })
    }
}

#[async_trait]
pub trait OutletPricingClient: Send + Sync {
    async fn set_price(&self, store_id: StoreId, product_code: &str, price: Decimal) -> Result<(), OutletError>;
}

// ============================================================================
// Simulated POS
// ============================================================================

/// One call received by the simulated POS
#[derive(Debug, Clone, PartialEq)]
pub struct OutletCall {
    pub store_id: StoreId,
    pub product_code: String,
    pub price: Decimal,
}

/// In-process POS used by the demo binary and tests. Failure modes are
/// configured per store when the client is built.
#[derive(Default)]
pub struct SimulatedPosClient {
    unavailable: HashSet<StoreId>,
    rejected_prices: HashSet<(StoreId, Decimal)>,
    panicking: HashSet<StoreId>,
    latency: HashMap<StoreId, Duration>,
    flaky: Mutex<HashMap<StoreId, u32>>,
    prices: Mutex<HashMap<(StoreId, String), Decimal>>,
    calls: Mutex<Vec<OutletCall>>,
}

impl SimulatedPosClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call to `store_id` fails as unavailable
    pub fn unavailable(mut self, store_id: StoreId) -> Self {
        self.unavailable.insert(store_id);
        self
    }

    /// `store_id` refuses to be set to `price`
    pub fn rejecting(mut self, store_id: StoreId, price: Decimal) -> Self {
        self.rejected_prices.insert((store_id, price));
        self
    }

    /// The first `failures` calls to `store_id` fail as unavailable
    pub fn flaky(mut self, store_id: StoreId, failures: u32) -> Self {
        self.flaky.get_mut().insert(store_id, failures);
        self
    }

    pub fn with_latency(mut self, store_id: StoreId, latency: Duration) -> Self {
        self.latency.insert(store_id, latency);
        self
    }

    /// Calls to `store_id` panic inside the client
    pub fn panicking(mut self, store_id: StoreId) -> Self {
        self.panicking.insert(store_id);
        self
    }

    pub async fn calls(&self) -> Vec<OutletCall> {
        self.calls.lock().await.clone()
    }

    pub async fn called_stores(&self) -> Vec<StoreId> {
        self.calls.lock().await.iter().map(|c| c.store_id).collect()
    }

    /// Price currently held by the POS of `store_id`
    pub async fn price_of(&self, store_id: StoreId, product_code: &str) -> Option<Decimal> {
        self.prices
            .lock()
            .await
            .get(&(store_id, product_code.to_string()))
            .copied()
    }
}

#[async_trait]
impl OutletPricingClient for SimulatedPosClient {
    async fn set_price(&self, store_id: StoreId, product_code: &str, price: Decimal) -> Result<(), OutletError> {
        self.calls.lock().await.push(OutletCall {
            store_id,
            product_code: product_code.to_string(),
            price,
        });

        if let Some(latency) = self.latency.get(&store_id) {
            tokio::time::sleep(*latency).await;
        }

        if self.panicking.contains(&store_id) {
            panic!("POS driver crashed for store {}", store_id);
        }

        if self.unavailable.contains(&store_id) {
            return Err(OutletError::Unavailable {
                store_id,
                message: "connection refused".to_string(),
            });
        }

        {
            let mut flaky = self.flaky.lock().await;
            if let Some(remaining) = flaky.get_mut(&store_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(OutletError::Unavailable {
                        store_id,
                        message: "temporarily unavailable".to_string(),
                    });
                }
            }
        }

        if self.rejected_prices.contains(&(store_id, price)) {
            return Err(OutletError::Rejected {
                store_id,
                product_code: product_code.to_string(),
                price,
                message: "price refused by store".to_string(),
            });
        }

        self.prices
            .lock()
            .await
            .insert((store_id, product_code.to_string()), price);

        tracing::debug!(store_id = %store_id, product_code = %product_code, price = %price, "POS price set");
        Ok(())
    }
}
