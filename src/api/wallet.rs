// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Custodial wallet and settlement balance endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::{active_profile, refresh_sessions};
use crate::auth::MerchantAuth;
use crate::blockchain::SettlementBalance;
use crate::error::ApiError;
use crate::providers::{wallet_idempotency_key, CustodialWallet, SignedTransaction, TokenBalance};
use crate::state::AppState;
use crate::storage::{with_retry, DbError, ProfileRepository};

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletBalanceResponse {
    pub wallet_id: String,
    pub balances: Vec<TokenBalance>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignRequest {
    /// EVM transaction object in Circle's JSON shape
    #[schema(value_type = Object)]
    pub transaction: Value,
    #[serde(default)]
    pub memo: Option<String>,
}

/// Provision a Circle wallet for the merchant.
#[utoipa::path(
    post,
    path = "/v1/wallet",
    tag = "Wallet",
    responses(
        (status = 201, description = "Wallet created", body = CustodialWallet),
        (status = 404, description = "Not onboarded"),
        (status = 409, description = "Merchant already has a custodial wallet"),
        (status = 503, description = "Circle not configured")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_wallet(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
) -> Result<(StatusCode, Json<CustodialWallet>), ApiError> {
    let profile = active_profile(&state, &merchant.wallet_address)?;
    if profile.circle_wallet_id.is_some() {
        return Err(ApiError::conflict("Merchant already has a custodial wallet"));
    }
    let wallets = state.wallets()?;

    let idempotency_key = wallet_idempotency_key(&profile.wallet_address);
    let wallet = wallets
        .create_wallet(&idempotency_key)
        .await
        .map_err(|e| ApiError::from_provider("Failed to create wallet", e))?;

    // The pre-check above can race; the write itself decides which wallet sticks.
    let repo = ProfileRepository::new(&state.db);
    let linked = with_retry(state.retry, || {
        repo.set_circle_wallet(&merchant.wallet_address, &wallet.wallet_id, &wallet.address)
    })
    .await;
    let profile = match linked {
        Ok(profile) => profile,
        Err(DbError::AlreadyExists(_)) => {
            warn!(
                wallet_address = %profile.wallet_address,
                wallet_id = %wallet.wallet_id,
                "Custodial wallet created but another wallet is already linked"
            );
            return Err(ApiError::conflict("Merchant already has a custodial wallet"));
        }
        Err(e) => return Err(e.into()),
    };
    refresh_sessions(&state, &profile).await?;

    info!(
        wallet_address = %profile.wallet_address,
        wallet_id = %wallet.wallet_id,
        "Custodial wallet linked"
    );
    Ok((StatusCode::CREATED, Json(wallet)))
}

/// Token balances of the merchant's Circle wallet.
#[utoipa::path(
    get,
    path = "/v1/wallet/{wallet_id}/balance",
    tag = "Wallet",
    params(("wallet_id" = String, Path, description = "Circle wallet id")),
    responses(
        (status = 200, description = "Balances", body = WalletBalanceResponse),
        (status = 403, description = "Wallet belongs to someone else"),
        (status = 503, description = "Circle not configured")
    ),
    security(("bearer_auth" = []))
)]
pub async fn wallet_balance(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
    Path(wallet_id): Path<String>,
) -> Result<Json<WalletBalanceResponse>, ApiError> {
    let profile = active_profile(&state, &merchant.wallet_address)?;
    if profile.circle_wallet_id.as_deref() != Some(wallet_id.as_str()) {
        return Err(ApiError::forbidden("Wallet does not belong to this merchant"));
    }
    let balances = state
        .wallets()?
        .balances(&wallet_id)
        .await
        .map_err(|e| ApiError::from_provider("Failed to fetch balances", e))?;
    Ok(Json(WalletBalanceResponse { wallet_id, balances }))
}

/// Sign a transaction with the merchant's Circle wallet.
#[utoipa::path(
    post,
    path = "/v1/wallet/sign",
    tag = "Wallet",
    request_body = SignRequest,
    responses(
        (status = 200, description = "Signed", body = SignedTransaction),
        (status = 400, description = "Invalid transaction"),
        (status = 404, description = "No custodial wallet"),
        (status = 503, description = "Circle not configured")
    ),
    security(("bearer_auth" = []))
)]
pub async fn sign_transaction(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
    Json(request): Json<SignRequest>,
) -> Result<Json<SignedTransaction>, ApiError> {
    if !request.transaction.is_object() {
        return Err(ApiError::bad_request("transaction must be a JSON object"));
    }
    let profile = active_profile(&state, &merchant.wallet_address)?;
    let wallet_id = profile
        .circle_wallet_id
        .as_deref()
        .ok_or_else(|| ApiError::not_found("Merchant has no custodial wallet"))?;

    let signed = state
        .wallets()?
        .sign_transaction(wallet_id, &request.transaction, request.memo.as_deref())
        .await
        .map_err(|e| ApiError::from_provider("Failed to sign transaction", e))?;
    info!(wallet_address = %profile.wallet_address, wallet_id, "Transaction signed");
    Ok(Json(signed))
}

/// USDC held at the merchant's settlement address, read over RPC.
#[utoipa::path(
    get,
    path = "/v1/balance/settlement",
    tag = "Wallet",
    responses(
        (status = 200, description = "Settlement balance", body = SettlementBalance),
        (status = 503, description = "Settlement RPC unavailable")
    ),
    security(("bearer_auth" = []))
)]
pub async fn settlement_balance(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
) -> Result<Json<SettlementBalance>, ApiError> {
    let profile = active_profile(&state, &merchant.wallet_address)?;
    let settlement = state
        .settlement
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Settlement RPC is not configured"))?;
    let balance = settlement
        .usdc_balance(profile.settlement_address())
        .await
        .map_err(|e| {
            warn!(wallet_address = %profile.wallet_address, error = %e, "Settlement balance read failed");
            ApiError::internal(format!("Failed to read settlement balance: {e}"))
        })?;
    Ok(Json(balance))
}
