// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Dashboard aggregate.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use super::active_profile;
use crate::auth::MerchantAuth;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{
    DbError, MerchantProfile, MerchantStats, MerchantTransaction, TransactionRepository,
};

/// Rows shown in the dashboard's recent list.
pub const RECENT_TRANSACTIONS: usize = 5;

/// Where a balance figure was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    Circle,
    SettlementRpc,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MerchantBalance {
    /// USDC amount as a decimal string
    pub usdc: String,
    pub source: BalanceSource,
}

impl MerchantBalance {
    pub fn as_f64(&self) -> f64 {
        self.usdc.parse().unwrap_or(0.0)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub merchant_id: String,
    pub business_name: String,
    pub stats: MerchantStats,
    pub recent_transactions: Vec<MerchantTransaction>,
    /// Absent when no balance source answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<MerchantBalance>,
}

/// Current USDC balance: Circle when the merchant has a custodial wallet,
/// otherwise the settlement chain over RPC.
pub(crate) async fn current_balance(
    state: &AppState,
    profile: &MerchantProfile,
) -> Result<MerchantBalance, ApiError> {
    if let (Some(wallets), Some(wallet_id)) = (&state.wallets, &profile.circle_wallet_id) {
        match wallets.balances(wallet_id).await {
            Ok(balances) => {
                let usdc = balances
                    .iter()
                    .find(|b| b.symbol.eq_ignore_ascii_case("USDC"))
                    .map(|b| b.amount.clone())
                    .unwrap_or_else(|| "0".to_string());
                return Ok(MerchantBalance {
                    usdc,
                    source: BalanceSource::Circle,
                });
            }
            Err(e) => warn!(
                wallet_address = %profile.wallet_address,
                error = %e,
                "Circle balance unavailable, falling back to settlement RPC"
            ),
        }
    }

    let settlement = state
        .settlement
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("No balance source is configured"))?;
    let balance = settlement
        .usdc_balance(profile.settlement_address())
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read settlement balance: {e}")))?;
    Ok(MerchantBalance {
        usdc: balance.balance_formatted,
        source: BalanceSource::SettlementRpc,
    })
}

/// Stats, recent payments and balance, loaded concurrently.
#[utoipa::path(
    get,
    path = "/v1/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Dashboard data", body = DashboardResponse),
        (status = 404, description = "Not onboarded")
    ),
    security(("bearer_auth" = []))
)]
pub async fn dashboard(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
) -> Result<Json<DashboardResponse>, ApiError> {
    let profile = active_profile(&state, &merchant.wallet_address)?;

    let stats_task = {
        let db = state.db.clone();
        let wallet = profile.wallet_address.clone();
        tokio::task::spawn_blocking(move || TransactionRepository::new(&db).stats(&wallet))
    };
    let recent_task = {
        let db = state.db.clone();
        let wallet = profile.wallet_address.clone();
        tokio::task::spawn_blocking(move || {
            TransactionRepository::new(&db)
                .list_by_merchant(&wallet, None, RECENT_TRANSACTIONS)
                .map(|(rows, _)| rows)
        })
    };

    let (stats, recent, balance) =
        tokio::join!(stats_task, recent_task, current_balance(&state, &profile));

    let stats = stats.map_err(DbError::from)??;
    let recent_transactions = recent.map_err(DbError::from)??;
    let balance = match balance {
        Ok(balance) => Some(balance),
        Err(e) => {
            warn!(wallet_address = %profile.wallet_address, error = %e.message, "Dashboard balance unavailable");
            None
        }
    };

    Ok(Json(DashboardResponse {
        merchant_id: profile.merchant_id,
        business_name: profile.business_name,
        stats,
        recent_transactions,
        balance,
    }))
}
