//! Exchange REST client.
//!
//! Owns the HTTP connection pool and the L2 credentials. Every write
//! carries the HMAC header set; key lifecycle calls carry the L1 wallet
//! attestation instead.

use std::time::Duration;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::core::domain::{OrderId, OrderType, SignedOrder};
use crate::error::{Error, ExchangeReject, Result};

use super::auth::{self, ApiCreds};
use super::messages::WsPriceLevel;
use super::signing::OrderSigner;

/// Timeout on order submission.
const ORDER_TIMEOUT: Duration = Duration::from_secs(25);

/// Timeout on read-side queries.
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// A REST book snapshot (same level shape as the websocket feed).
#[derive(Debug, Clone, Deserialize)]
pub struct RestBook {
    pub market: Option<String>,
    pub asset_id: String,
    #[serde(default)]
    pub bids: Vec<WsPriceLevel>,
    #[serde(default)]
    pub asks: Vec<WsPriceLevel>,
    pub timestamp: Option<String>,
}

/// Market metadata from `GET /markets/{condition_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestMarket {
    pub condition_id: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub market_slug: Option<String>,
    #[serde(default)]
    pub neg_risk: bool,
    #[serde(default)]
    pub minimum_order_size: Option<String>,
    #[serde(default)]
    pub minimum_tick_size: Option<String>,
    #[serde(default)]
    pub tokens: Vec<RestMarketToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestMarketToken {
    pub token_id: String,
    pub outcome: String,
}

/// Order status from `GET /data/order/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestOrderStatus {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub size_matched: Option<String>,
}

/// One account trade from `GET /data/trades`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestTrade {
    pub id: String,
    pub asset_id: String,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Balance/allowance snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceAllowance {
    pub balance: String,
    #[serde(default)]
    pub allowance: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostOrderResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "errorMsg", default)]
    error_msg: Option<String>,
    #[serde(rename = "orderID", default)]
    order_id: Option<String>,
}

/// REST client for the exchange.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    address: String,
    creds: RwLock<Option<ApiCreds>>,
}

impl RestClient {
    /// Build a client with a pooled connection per host.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(20)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(QUERY_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            address: address.into(),
            creds: RwLock::new(None),
        })
    }

    /// Install L2 credentials for authenticated calls.
    pub fn set_creds(&self, creds: ApiCreds) {
        *self.creds.write() = Some(creds);
    }

    #[must_use]
    pub fn has_creds(&self) -> bool {
        self.creds.read().is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Warm the connection pool and clock-check against `GET /time`.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the request.
    pub async fn warm(&self) -> Result<()> {
        let server_time: String = self
            .http
            .get(self.url("/time"))
            .send()
            .await?
            .text()
            .await?;
        debug!(server_time, "Exchange connection warm");
        Ok(())
    }

    /// Fetch the resting book for one token.
    ///
    /// # Errors
    ///
    /// Returns transport errors or [`ExchangeReject::NoBook`] on 404.
    pub async fn book(&self, token_id: &str) -> Result<RestBook> {
        let response = self
            .http
            .get(self.url("/book"))
            .query(&[("token_id", token_id)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ExchangeReject::NoBook(token_id.to_string()).into());
        }
        Ok(response.error_for_status()?.json().await?)
    }

    /// Fetch market metadata by condition id.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the request.
    pub async fn market(&self, condition_id: &str) -> Result<RestMarket> {
        let response = self
            .http
            .get(self.url(&format!("/markets/{condition_id}")))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Create API credentials with an L1 wallet attestation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the exchange refuses the attestation.
    pub async fn create_api_key(&self, signer: &OrderSigner, nonce: u64) -> Result<ApiCreds> {
        let timestamp = chrono::Utc::now().timestamp();
        let headers = auth::l1_headers(signer, timestamp, nonce)?;

        let mut request = self
            .http
            .post(self.url("/auth/api-key"))
            .json(&json!({ "nonce": chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0) }));
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Auth(format!(
                "api-key create rejected: {}",
                response.status()
            )));
        }

        let creds: ApiCreds = response.json().await?;
        info!("API credentials created");
        self.set_creds(creds.clone());
        Ok(creds)
    }

    /// Re-derive existing API credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the exchange refuses the attestation.
    pub async fn derive_api_key(&self, signer: &OrderSigner, nonce: u64) -> Result<ApiCreds> {
        let timestamp = chrono::Utc::now().timestamp();
        let headers = auth::l1_headers(signer, timestamp, nonce)?;

        let mut request = self.http.get(self.url("/auth/derive-api-key"));
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Auth(format!(
                "api-key derive rejected: {}",
                response.status()
            )));
        }

        let creds: ApiCreds = response.json().await?;
        info!("API credentials derived");
        self.set_creds(creds.clone());
        Ok(creds)
    }

    /// Revoke the installed API credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] without installed credentials.
    pub async fn delete_api_key(&self) -> Result<()> {
        let request = self.authed(reqwest::Method::DELETE, "/auth/api-key", "")?;
        request.send().await?.error_for_status()?;
        *self.creds.write() = None;
        Ok(())
    }

    /// Submit a signed order.
    ///
    /// # Errors
    ///
    /// Returns a typed [`ExchangeReject`] mapped from the response, or
    /// transport errors.
    pub async fn post_order(&self, order: &SignedOrder, order_type: OrderType) -> Result<OrderId> {
        let api_key = self
            .creds
            .read()
            .as_ref()
            .map(|c| c.api_key.clone())
            .ok_or_else(|| Error::Auth("no API credentials installed".into()))?;

        let body = json!({
            "order": order,
            "owner": api_key,
            "orderType": order_type.as_str(),
        });
        let body_text = body.to_string();

        let request = self
            .authed(reqwest::Method::POST, "/order", &body_text)?
            .timeout(ORDER_TIMEOUT)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body_text);

        let response: PostOrderResponse = request.send().await?.json().await?;

        if response.success {
            let id = response.order_id.unwrap_or_default();
            debug!(order_id = %id, side = %order.side, "Order accepted");
            return Ok(OrderId::new(id));
        }

        let message = response.error_msg.unwrap_or_else(|| "unknown".into());
        warn!(error = %message, side = %order.side, "Order rejected");
        Err(classify_reject(&message).into())
    }

    /// Cancel one order by id. Returns whether the exchange knew it.
    ///
    /// # Errors
    ///
    /// Returns transport errors; a 404 is reported as `Ok(false)`.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<bool> {
        let path = format!("/order/{order_id}");
        let response = self.authed(reqwest::Method::DELETE, &path, "")?.send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        response.error_for_status()?;
        Ok(true)
    }

    /// Poll one order's status.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the request.
    pub async fn order_status(&self, order_id: &OrderId) -> Result<RestOrderStatus> {
        let path = format!("/data/order/{order_id}");
        let response = self.authed(reqwest::Method::GET, &path, "")?.send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Recent trades for the authenticated account.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the request.
    pub async fn trades(&self) -> Result<Vec<RestTrade>> {
        let response = self
            .authed(reqwest::Method::GET, "/data/trades", "")?
            .send()
            .await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Balance and allowance for an asset.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the request.
    pub async fn balance_allowance(
        &self,
        asset_type: &str,
        token_id: Option<&str>,
        signature_type: u8,
    ) -> Result<BalanceAllowance> {
        let mut query = vec![
            ("asset_type".to_string(), asset_type.to_string()),
            ("signature_type".to_string(), signature_type.to_string()),
        ];
        if let Some(token_id) = token_id {
            query.push(("token_id".to_string(), token_id.to_string()));
        }

        let response = self
            .authed(reqwest::Method::GET, "/balance-allowance", "")?
            .query(&query)
            .send()
            .await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Build a request with L2 headers over `(timestamp, method, path, body)`.
    fn authed(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &str,
    ) -> Result<reqwest::RequestBuilder> {
        let creds = self.creds.read();
        let creds = creds
            .as_ref()
            .ok_or_else(|| Error::Auth("no API credentials installed".into()))?;

        let timestamp = chrono::Utc::now().timestamp();
        let headers =
            auth::l2_headers(&self.address, creds, timestamp, method.as_str(), path, body)?;

        let mut request = self.http.request(method, self.url(path));
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }
        Ok(request)
    }
}

/// Map an exchange rejection message onto the error taxonomy.
fn classify_reject(message: &str) -> ExchangeReject {
    let lower = message.to_ascii_lowercase();
    if lower.contains("minimum order") || lower.contains("size must be") {
        ExchangeReject::OrderTooSmall(message.to_string())
    } else if lower.contains("paused") {
        ExchangeReject::TradingPaused
    } else if lower.contains("invalid price") || lower.contains("tick size") {
        ExchangeReject::InvalidPrice(message.to_string())
    } else {
        ExchangeReject::Remote(message.to_string())
    }
}
