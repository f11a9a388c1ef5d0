//! Brokerage gateway trait
//! Price/position queries and order primitives consumed by the controller

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;

/// Current quote for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
}

/// Held quantity and broker-computed average cost. The controller never
/// derives these locally; every tick re-reads them from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub quantity: f64,
    pub average_cost: f64,
}

/// Acknowledgement for a submitted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

/// Lifecycle state reported by the broker for an open order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Pending,
    Filled,
}

/// Brokerage operations. Every call is fallible; the controller treats any
/// failure as transient and retries the whole decision loop.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Fetch the current price for a symbol
    async fn fetch_price(&self, symbol: &str) -> Result<f64, ApiError>;

    /// Fetch held quantity and average cost for a symbol
    async fn fetch_position(&self, symbol: &str) -> Result<PositionSnapshot, ApiError>;

    /// Submit a market sell for the given quantity
    async fn submit_market_sell(&self, symbol: &str, quantity: f64) -> Result<OrderAck, ApiError>;

    /// Submit a limit buy at the given price
    async fn submit_limit_buy(
        &self,
        symbol: &str,
        price: f64,
        quantity: f64,
    ) -> Result<OrderAck, ApiError>;

    /// Query the fill state of an order
    async fn fetch_order_status(&self, order_id: &str) -> Result<OrderState, ApiError>;

    /// Cancel an open order
    async fn cancel_order(&self, order_id: &str) -> Result<(), ApiError>;
}
