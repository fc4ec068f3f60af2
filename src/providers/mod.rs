// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Vendor integrations.
//!
//! - [`circle`]: custodial settlement wallets (create, balances, signing)
//! - [`lifi`]: cross-chain route discovery, step transactions, bridge status
//! - [`moralis`]: ERC-20 balances of arbitrary payer wallets
//!
//! Each vendor sits behind a trait so handlers and the bridge poller can be
//! exercised with in-process fakes. Vendor calls are not retried; failures
//! surface to the caller with the upstream message.

pub mod circle;
pub mod lifi;
pub mod moralis;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Longest upstream message kept in an error.
const MAX_UPSTREAM_MESSAGE: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("vendor rejected credentials: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify a non-success vendor response.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ProviderError::InvalidRequest(message)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(message),
            StatusCode::NOT_FOUND => ProviderError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(message),
            other => ProviderError::Upstream {
                status: other.as_u16(),
                message,
            },
        }
    }
}

/// Pull a readable message out of a vendor error body.
///
/// Vendors put it under `message` or `error`; otherwise the raw body is used.
pub fn upstream_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "error", "error_description"]
            .iter()
            .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.is_empty() {
        return "empty response body".to_string();
    }
    let mut message = message;
    if message.len() > MAX_UPSTREAM_MESSAGE {
        let mut cut = MAX_UPSTREAM_MESSAGE;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    message
}

/// Read a JSON body, turning non-success statuses into [`ProviderError`].
pub(crate) async fn read_json(
    vendor: &str,
    what: &str,
    response: reqwest::Response,
) -> Result<Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = upstream_message(&body);
        tracing::warn!(
            vendor,
            operation = what,
            status = status.as_u16(),
            error = %message,
            "Vendor request failed"
        );
        return Err(ProviderError::from_status(status, message));
    }
    response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("{vendor} {what}: {e}")))
}

// =============================================================================
// Shared types
// =============================================================================

/// One token holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TokenBalance {
    /// Contract address; `None` for the native asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    /// Human-readable amount
    pub amount: String,
}

/// A newly provisioned custodial wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CustodialWallet {
    pub wallet_id: String,
    pub address: String,
    pub blockchain: String,
}

/// Result of signing with a custodial wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SignedTransaction {
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_transaction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// Route quote parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouteRequest {
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub from_token_address: String,
    pub to_token_address: String,
    /// Amount in the source token's smallest unit
    pub from_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    pub to_address: String,
    /// Fraction, e.g. 0.005 for 0.5%
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slippage: Option<f64>,
}

/// Bridge status lookup parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusQuery {
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_chain: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_chain: Option<u64>,
}

/// Coarse bridge transfer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeState {
    Pending,
    Done,
    Failed,
    NotFound,
    Invalid,
}

/// Bridge status as reported by the routing vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BridgeStatus {
    pub status: BridgeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substatus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substatus_message: Option<String>,
    /// Destination-chain transaction, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiving_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

// =============================================================================
// Vendor seams
// =============================================================================

/// Source of cross-chain routes.
#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Candidate routes as raw vendor JSON, validated later by
    /// [`crate::routing::Route::from_vendor_list`].
    async fn routes(&self, request: &RouteRequest) -> Result<Vec<Value>, ProviderError>;

    /// Populate a step with its transaction request for client-side signing.
    async fn step_transaction(&self, step: &Value) -> Result<Value, ProviderError>;

    async fn status(&self, query: &StatusQuery) -> Result<BridgeStatus, ProviderError>;
}

/// Custodial wallet provider.
#[async_trait]
pub trait CustodialWallets: Send + Sync {
    async fn create_wallet(&self, idempotency_key: &str) -> Result<CustodialWallet, ProviderError>;

    async fn balances(&self, wallet_id: &str) -> Result<Vec<TokenBalance>, ProviderError>;

    async fn sign_transaction(
        &self,
        wallet_id: &str,
        transaction: &Value,
        memo: Option<&str>,
    ) -> Result<SignedTransaction, ProviderError>;
}

/// Idempotency key for provisioning a merchant's custodial wallet.
///
/// Derived from the merchant wallet, so every attempt for one merchant
/// carries the same key and the vendor hands back the same wallet.
pub fn wallet_idempotency_key(merchant_wallet: &str) -> String {
    let name = format!("hati:merchant-wallet:{}", merchant_wallet.to_lowercase());
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// ERC-20 balances for arbitrary addresses.
#[async_trait]
pub trait TokenBalances: Send + Sync {
    async fn erc20_balances(
        &self,
        address: &str,
        chain: &str,
    ) -> Result<Vec<TokenBalance>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            ProviderError::from_status(StatusCode::BAD_REQUEST, "x".into()),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::FORBIDDEN, "x".into()),
            ProviderError::Unauthorized(_)
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, "x".into()),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::BAD_GATEWAY, "x".into()),
            ProviderError::Upstream { status: 502, .. }
        ));
    }

    #[test]
    fn upstream_message_prefers_json_message() {
        assert_eq!(
            upstream_message(r#"{"code":1003,"message":"No available quotes"}"#),
            "No available quotes"
        );
        assert_eq!(upstream_message(r#"{"error":"bad key"}"#), "bad key");
        assert_eq!(upstream_message("  gateway timeout "), "gateway timeout");
        assert_eq!(upstream_message(""), "empty response body");
    }

    #[test]
    fn upstream_message_is_truncated() {
        let long = "é".repeat(400);
        let message = upstream_message(&long);
        assert!(message.len() <= MAX_UPSTREAM_MESSAGE);
    }

    #[test]
    fn wallet_key_is_stable_per_merchant() {
        let a = wallet_idempotency_key("0xAbC0000000000000000000000000000000000001");
        let b = wallet_idempotency_key("0xabc0000000000000000000000000000000000001");
        let other = wallet_idempotency_key("0xabc0000000000000000000000000000000000002");
        assert_eq!(a, b);
        assert_ne!(a, other);
        assert_eq!(uuid::Uuid::parse_str(&a).unwrap().get_version_num(), 5);
    }

    #[test]
    fn bridge_state_wire_names() {
        assert_eq!(serde_json::to_string(&BridgeState::NotFound).unwrap(), "\"NOT_FOUND\"");
        let parsed: BridgeState = serde_json::from_str("\"DONE\"").unwrap();
        assert_eq!(parsed, BridgeState::Done);
    }
}
