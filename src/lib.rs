//! Splitbot - Split-entry, full-exit equity trading bot
//!
//! Features:
//! - Fixed per-session capital reservoir split into bounded buy tranches
//! - Full exit on profit target or capital-exhaustion condition
//! - NYSE session clock with holiday and early-close handling
//! - Daily state reset, one process runs day after day

pub mod api;
pub mod config;
pub mod market;
pub mod trading;
pub mod utils;

// Re-export commonly used types
pub use api::{
    ApiError, BrokerGateway, OrderAck, OrderState, PositionSnapshot, Quote, RestBrokerClient,
};
pub use config::{Config, Credentials, Environment, TradingConfig};
pub use market::{CalendarError, MarketClock, Session};
pub use trading::{
    ControllerSettings, OrderKind, OrderSlot, PositionLedger, RunOutcome, SessionOutcome,
    SessionStats, TradingController,
};
pub use utils::{retry, Clock, RateLimiter, SystemClock};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("API error: {0}")]
    Api(#[from] api::ApiError),
    #[error("Calendar error: {0}")]
    Calendar(#[from] market::CalendarError),
}

impl BotError {
    /// Transient errors are logged and retried by the controller loop;
    /// everything else tears the process down.
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::Api(_))
    }
}

/// Bot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
