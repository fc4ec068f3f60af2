// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Payer-facing bridging endpoints.
//!
//! These are public: the payer is not a merchant. The destination is always
//! the merchant's settlement address in USDC on the settlement chain.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use super::resolve_merchant;
use crate::error::ApiError;
use crate::providers::{BridgeStatus, RouteRequest, StatusQuery};
use crate::routing::{order_routes, RankedRoute, Route};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuoteRequest {
    /// Merchant being paid
    pub merchant_id: String,
    pub from_chain_id: u64,
    pub from_token_address: String,
    /// Amount in the source token's smallest unit
    pub from_amount: String,
    /// Payer wallet
    #[serde(default)]
    pub from_address: Option<String>,
    /// Fraction, e.g. 0.005
    #[serde(default)]
    pub slippage: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoutesResponse {
    pub merchant_id: String,
    pub to_address: String,
    pub best: RankedRoute,
    /// All valid routes, most preferred first
    pub routes: Vec<RankedRoute>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExecuteResponse {
    pub route: RankedRoute,
    /// First step populated by the bridging API
    #[schema(value_type = Object)]
    pub step: Value,
    /// Transaction for the payer's wallet to sign and send
    #[schema(value_type = Object)]
    pub transaction_request: Value,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusParams {
    #[serde(alias = "txHash")]
    pub tx_hash: String,
    #[serde(default)]
    pub bridge: Option<String>,
    #[serde(default, alias = "fromChain")]
    pub from_chain: Option<u64>,
    #[serde(default, alias = "toChain")]
    pub to_chain: Option<u64>,
}

fn validate_quote(request: &QuoteRequest) -> Result<(), ApiError> {
    if request.from_token_address.trim().is_empty() {
        return Err(ApiError::bad_request("from_token_address is required"));
    }
    let amount_ok = !request.from_amount.is_empty()
        && request.from_amount.bytes().all(|b| b.is_ascii_digit())
        && request.from_amount.bytes().any(|b| b != b'0');
    if !amount_ok {
        return Err(ApiError::bad_request(
            "from_amount must be a positive integer in the token's smallest unit",
        ));
    }
    if let Some(slippage) = request.slippage {
        if !(0.0..1.0).contains(&slippage) {
            return Err(ApiError::bad_request("slippage must be a fraction between 0 and 1"));
        }
    }
    Ok(())
}

/// Fetch, validate and order routes for a payment.
async fn ranked_routes(
    state: &AppState,
    request: &QuoteRequest,
) -> Result<(String, Vec<RankedRoute>), ApiError> {
    validate_quote(request)?;
    let profile = resolve_merchant(state, &request.merchant_id)?;
    let network = state.settlement_network.config();
    let to_address = profile.settlement_address().to_string();

    let route_request = RouteRequest {
        from_chain_id: request.from_chain_id,
        to_chain_id: network.chain_id,
        from_token_address: request.from_token_address.clone(),
        to_token_address: network.usdc_address.to_string(),
        from_amount: request.from_amount.clone(),
        from_address: request.from_address.clone(),
        to_address: to_address.clone(),
        slippage: request.slippage,
    };

    let raw = state
        .routes
        .routes(&route_request)
        .await
        .map_err(|e| ApiError::from_provider("Failed to fetch routes", e))?;
    let total = raw.len();
    let routes = Route::from_vendor_list(&raw);
    if routes.len() < total {
        warn!(
            merchant_id = %request.merchant_id,
            dropped = total - routes.len(),
            "Discarded malformed routes"
        );
    }

    Ok((to_address, order_routes(routes, &state.route_policy)))
}

/// Quote routes to pay a merchant, best first.
#[utoipa::path(
    post,
    path = "/v1/bridge/routes",
    tag = "Bridge",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Ranked routes", body = RoutesResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown merchant or no route available")
    )
)]
pub async fn routes(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<RoutesResponse>, ApiError> {
    let (to_address, ranked) = ranked_routes(&state, &request).await?;
    let best = ranked
        .first()
        .cloned()
        .ok_or_else(|| ApiError::not_found("No routes available for this payment"))?;
    Ok(Json(RoutesResponse {
        merchant_id: request.merchant_id,
        to_address,
        best,
        routes: ranked,
    }))
}

/// Best route plus its first-step transaction, ready for the payer to sign.
#[utoipa::path(
    post,
    path = "/v1/bridge/execute",
    tag = "Bridge",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Transaction to sign", body = ExecuteResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown merchant or no route available")
    )
)]
pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let (_, ranked) = ranked_routes(&state, &request).await?;
    let best = ranked
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("No routes available for this payment"))?;
    let first = best
        .route
        .steps
        .first()
        .ok_or_else(|| ApiError::internal("Route has no steps"))?;

    let step = state
        .routes
        .step_transaction(&first.raw)
        .await
        .map_err(|e| ApiError::from_provider("Failed to prepare transaction", e))?;
    let transaction_request = step
        .get("transactionRequest")
        .cloned()
        .ok_or_else(|| ApiError::internal("Bridging API returned no transaction request"))?;

    info!(
        merchant_id = %request.merchant_id,
        route_id = %best.route.id,
        protocol = %best.route.protocol,
        estimated_secs = best.estimated_settlement_secs,
        "Payment transaction prepared"
    );
    Ok(Json(ExecuteResponse {
        route: best,
        step,
        transaction_request,
    }))
}

/// Bridge transfer status, proxied from the bridging API.
#[utoipa::path(
    get,
    path = "/v1/bridge/status",
    tag = "Bridge",
    params(StatusParams),
    responses(
        (status = 200, description = "Transfer status", body = BridgeStatus),
        (status = 400, description = "Missing transaction hash")
    )
)]
pub async fn status(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> Result<Json<BridgeStatus>, ApiError> {
    let query = StatusQuery {
        tx_hash: params.tx_hash,
        bridge: params.bridge,
        from_chain: params.from_chain,
        to_chain: params.to_chain,
    };
    let status = state
        .routes
        .status(&query)
        .await
        .map_err(|e| ApiError::from_provider("Failed to fetch bridge status", e))?;
    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(amount: &str, slippage: Option<f64>) -> QuoteRequest {
        QuoteRequest {
            merchant_id: "HT-001".into(),
            from_chain_id: 42161,
            from_token_address: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831".into(),
            from_amount: amount.into(),
            from_address: None,
            slippage,
        }
    }

    #[test]
    fn quote_validation() {
        assert!(validate_quote(&quote("1000000", Some(0.005))).is_ok());
        assert!(validate_quote(&quote("0", None)).is_err());
        assert!(validate_quote(&quote("1.5", None)).is_err());
        assert!(validate_quote(&quote("", None)).is_err());
        assert!(validate_quote(&quote("100", Some(1.5))).is_err());
    }
}
