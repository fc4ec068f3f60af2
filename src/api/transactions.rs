// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Merchant payment history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::resolve_merchant;
use crate::auth::MerchantAuth;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{
    with_retry, MerchantTransaction, NewTransaction, TransactionRepository, TxStatus,
};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters for transaction list.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionListQuery {
    /// Cursor from a previous page
    pub cursor: Option<String>,
    /// Maximum number of results (default: 20, max: 100)
    #[param(default = 20)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    /// Newest first
    pub transactions: Vec<MerchantTransaction>,
    /// Present when more rows exist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Payment initiated by a payer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordTransactionRequest {
    /// Source-chain transaction hash
    pub tx_hash: String,
    /// Merchant being paid
    pub merchant_id: String,
    pub source_chain: String,
    /// Defaults to the settlement chain id
    #[serde(default)]
    pub destination_chain: Option<String>,
    #[serde(default)]
    pub source_token: Option<String>,
    pub amount: String,
    pub usd_value: f64,
    /// Bridge tool of the chosen route
    pub protocol: String,
    #[serde(default)]
    pub estimated_time_secs: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: TxStatus,
    /// Measured bridge time; defaults to elapsed time on completion
    #[serde(default)]
    pub bridge_time_secs: Option<u64>,
}

fn is_tx_hash(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn validate_record(request: &RecordTransactionRequest) -> Result<(), ApiError> {
    if !is_tx_hash(&request.tx_hash) {
        return Err(ApiError::bad_request("tx_hash must be 0x followed by 64 hex characters"));
    }
    if request.source_chain.trim().is_empty() {
        return Err(ApiError::bad_request("source_chain is required"));
    }
    if request.amount.trim().is_empty() {
        return Err(ApiError::bad_request("amount is required"));
    }
    if !request.usd_value.is_finite() || request.usd_value < 0.0 {
        return Err(ApiError::bad_request("usd_value must be a non-negative number"));
    }
    Ok(())
}

/// Load a payment and check it belongs to `wallet`.
fn owned_transaction(
    state: &AppState,
    wallet: &str,
    tx_hash: &str,
) -> Result<MerchantTransaction, ApiError> {
    TransactionRepository::new(&state.db)
        .get(tx_hash)?
        .filter(|tx| tx.merchant_wallet == wallet)
        .ok_or_else(|| ApiError::not_found(format!("Transaction {tx_hash} not found")))
}

// =============================================================================
// Handlers
// =============================================================================

/// Page through the merchant's payments, newest first.
#[utoipa::path(
    get,
    path = "/v1/transactions",
    tag = "Transactions",
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Page of payments", body = TransactionListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let (transactions, next_cursor) = TransactionRepository::new(&state.db).list_by_merchant(
        &merchant.wallet_address,
        query.cursor.as_deref(),
        limit,
    )?;
    Ok(Json(TransactionListResponse {
        transactions,
        next_cursor,
    }))
}

/// Record a payment the payer just sent.
#[utoipa::path(
    post,
    path = "/v1/transactions",
    tag = "Transactions",
    request_body = RecordTransactionRequest,
    responses(
        (status = 201, description = "Payment recorded", body = MerchantTransaction),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Unknown merchant"),
        (status = 409, description = "Transaction already recorded")
    )
)]
pub async fn record_transaction(
    State(state): State<AppState>,
    Json(request): Json<RecordTransactionRequest>,
) -> Result<(StatusCode, Json<MerchantTransaction>), ApiError> {
    validate_record(&request)?;
    let profile = resolve_merchant(&state, &request.merchant_id)?;

    let tx = MerchantTransaction::new_pending(NewTransaction {
        tx_hash: request.tx_hash.to_lowercase(),
        merchant_wallet: profile.wallet_address.clone(),
        source_chain: request.source_chain.trim().to_string(),
        destination_chain: request
            .destination_chain
            .unwrap_or_else(|| state.settlement_network.config().chain_id.to_string()),
        source_token: request.source_token,
        amount: request.amount,
        usd_value: request.usd_value,
        protocol: request.protocol,
        estimated_time_secs: request.estimated_time_secs,
    });

    let repo = TransactionRepository::new(&state.db);
    with_retry(state.retry, || repo.create(&tx)).await?;
    info!(
        tx_hash = %tx.tx_hash,
        merchant_id = %profile.merchant_id,
        usd_value = tx.usd_value,
        protocol = %tx.protocol,
        "Payment recorded"
    );
    Ok((StatusCode::CREATED, Json(tx)))
}

/// One of the merchant's payments.
#[utoipa::path(
    get,
    path = "/v1/transactions/{tx_hash}",
    tag = "Transactions",
    params(("tx_hash" = String, Path, description = "Source-chain transaction hash")),
    responses(
        (status = 200, description = "Payment", body = MerchantTransaction),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
    Path(tx_hash): Path<String>,
) -> Result<Json<MerchantTransaction>, ApiError> {
    let tx = owned_transaction(&state, &merchant.wallet_address, &tx_hash.to_lowercase())?;
    Ok(Json(tx))
}

/// Move a payment to a new status.
#[utoipa::path(
    put,
    path = "/v1/transactions/{tx_hash}/status",
    tag = "Transactions",
    params(("tx_hash" = String, Path, description = "Source-chain transaction hash")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated payment", body = MerchantTransaction),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not a forward status move")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_status(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
    Path(tx_hash): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<MerchantTransaction>, ApiError> {
    let tx_hash = tx_hash.to_lowercase();
    owned_transaction(&state, &merchant.wallet_address, &tx_hash)?;

    let repo = TransactionRepository::new(&state.db);
    let tx = with_retry(state.retry, || {
        repo.update_status(&tx_hash, request.status, request.bridge_time_secs)
    })
    .await?;
    info!(tx_hash = %tx.tx_hash, status = %tx.status, "Payment status updated");
    Ok(Json(tx))
}
