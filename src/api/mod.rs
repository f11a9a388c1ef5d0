//! Brokerage API clients
//! Gateway trait consumed by the controller, REST implementation

pub mod broker;
pub mod rest;

pub use broker::{BrokerGateway, OrderAck, OrderState, PositionSnapshot, Quote};
pub use rest::RestBrokerClient;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Order rejected: {reason}")]
    OrderRejected { reason: String },
}

/// Sanitize API error message to avoid leaking sensitive information
/// In production, returns generic error message for server-side failures
pub fn sanitize_api_error(status: u16, detailed_message: String) -> ApiError {
    if cfg!(not(debug_assertions)) && status >= 500 {
        tracing::error!("API error {}: {}", status, detailed_message);
        return ApiError::ApiError {
            status,
            message: "Internal server error".to_string(),
        };
    }

    let safe_message = if detailed_message.len() > 500 {
        format!("{}... (truncated)", &detailed_message[..500])
    } else {
        detailed_message
    };

    ApiError::ApiError {
        status,
        message: safe_message,
    }
}
