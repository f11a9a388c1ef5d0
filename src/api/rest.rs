//! REST brokerage client
//! Implements the gateway trait over the brokerage's order API; the paper
//! environment targets the brokerage's sandbox host.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::broker::{BrokerGateway, OrderAck, OrderState, PositionSnapshot, Quote};
use crate::api::{sanitize_api_error, ApiError};
use crate::config::{Credentials, Environment};
use crate::utils::rate_limiter::RateLimiter;
use crate::utils::retry::{retry_with_backoff, RetryConfig};

const LIVE_API_URL: &str = "https://openapi.koreainvestment.com:9443";
const PAPER_API_URL: &str = "https://openapivts.koreainvestment.com:29443";

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    symbol: &'a str,
    side: &'a str,
    order_type: &'a str,
    quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<f64>,
}

#[derive(Debug, serde::Deserialize)]
struct OrderStatusResponse {
    #[allow(dead_code)]
    order_id: String,
    status: OrderState,
}

/// REST brokerage client with request timeouts, credential headers and a
/// minimum-interval rate limit on every call. Price and position reads are
/// retried with backoff; order placement and cancellation are not retried
/// here, the controller's recovery loop owns that.
pub struct RestBrokerClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    rate_limiter: RateLimiter,
}

impl RestBrokerClient {
    /// Create a client for the given environment.
    pub fn new(environment: Environment, credentials: Credentials) -> Self {
        let base_url = match environment {
            Environment::Live => LIVE_API_URL,
            Environment::Paper => PAPER_API_URL,
        };
        Self::with_base_url(base_url, credentials)
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(base_url: impl Into<String>, credentials: Credentials) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            credentials,
            rate_limiter: RateLimiter::new(200),
        }
    }

    fn get_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "application/json".parse().unwrap(),
        );
        headers.insert("X-API-KEY", self.credentials.api_key.parse().unwrap());
        headers.insert("X-API-SECRET", self.credentials.api_secret.parse().unwrap());
        headers.insert("X-ACCOUNT-NO", self.credentials.account_no.parse().unwrap());
        headers
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        self.rate_limiter.wait().await;

        let response = self
            .client
            .get(url)
            .headers(self.get_headers())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(sanitize_api_error(status.as_u16(), error_text));
        }

        Ok(response.json().await?)
    }

    async fn submit_order(&self, request: OrderRequest<'_>) -> Result<OrderAck, ApiError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/v1/orders", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.get_headers())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(sanitize_api_error(status.as_u16(), error_text));
        }

        let ack: OrderAck = response.json().await?;
        info!(
            "✅ Order accepted: {} ({} {} x{})",
            ack.order_id, request.side, request.order_type, request.quantity
        );
        Ok(ack)
    }
}

#[async_trait]
impl BrokerGateway for RestBrokerClient {
    async fn fetch_price(&self, symbol: &str) -> Result<f64, ApiError> {
        let url = format!("{}/v1/quote/{}", self.base_url, symbol);
        let quote: Quote = retry_with_backoff("fetch_price", RetryConfig::new(3, 200), || {
            self.get_json(&url)
        })
        .await?;
        debug!("Quote {}: {:.2}", quote.symbol, quote.price);
        Ok(quote.price)
    }

    async fn fetch_position(&self, symbol: &str) -> Result<PositionSnapshot, ApiError> {
        let url = format!("{}/v1/positions/{}", self.base_url, symbol);
        retry_with_backoff("fetch_position", RetryConfig::new(3, 200), || {
            self.get_json(&url)
        })
        .await
    }

    async fn submit_market_sell(&self, symbol: &str, quantity: f64) -> Result<OrderAck, ApiError> {
        self.submit_order(OrderRequest {
            symbol,
            side: "sell",
            order_type: "market",
            quantity,
            limit_price: None,
        })
        .await
    }

    async fn submit_limit_buy(
        &self,
        symbol: &str,
        price: f64,
        quantity: f64,
    ) -> Result<OrderAck, ApiError> {
        self.submit_order(OrderRequest {
            symbol,
            side: "buy",
            order_type: "limit",
            quantity,
            limit_price: Some(price),
        })
        .await
    }

    async fn fetch_order_status(&self, order_id: &str) -> Result<OrderState, ApiError> {
        let url = format!("{}/v1/orders/{}", self.base_url, order_id);
        let status: OrderStatusResponse = self.get_json(&url).await?;
        Ok(status.status)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ApiError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/v1/orders/{}", self.base_url, order_id);
        let response = self
            .client
            .delete(&url)
            .headers(self.get_headers())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(sanitize_api_error(status.as_u16(), error_text));
        }

        info!("🗑️ Cancelled order: {}", order_id);
        Ok(())
    }
}
