// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::parse_address;
use crate::blockchain::SettlementNetwork;
use crate::error::ApiError;
use crate::providers::TokenBalance;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct TokenBalanceQuery {
    /// Moralis chain name or hex id; defaults to the settlement chain
    #[serde(default)]
    pub chain: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenBalancesResponse {
    pub address: String,
    pub chain: String,
    pub balances: Vec<TokenBalance>,
}

fn moralis_chain(network: SettlementNetwork) -> &'static str {
    match network {
        SettlementNetwork::Base => "base",
        SettlementNetwork::BaseSepolia => "base sepolia",
    }
}

/// ERC-20 balances of any wallet, used by the payment page to pick a token.
#[utoipa::path(
    get,
    path = "/v1/tokens/{address}/balances",
    tag = "Tokens",
    params(
        ("address" = String, Path, description = "Wallet address"),
        TokenBalanceQuery
    ),
    responses(
        (status = 200, description = "Token balances", body = TokenBalancesResponse),
        (status = 400, description = "Invalid address"),
        (status = 503, description = "Token balance provider not configured")
    )
)]
pub async fn token_balances(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<TokenBalanceQuery>,
) -> Result<Json<TokenBalancesResponse>, ApiError> {
    parse_address(&address).map_err(|_| ApiError::bad_request("Invalid wallet address"))?;
    let chain = query
        .chain
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| moralis_chain(state.settlement_network).to_string());

    let balances = state
        .token_balances()?
        .erc20_balances(&address, &chain)
        .await
        .map_err(|e| ApiError::from_provider("Failed to fetch token balances", e))?;

    Ok(Json(TokenBalancesResponse {
        address,
        chain,
        balances,
    }))
}
