// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Yield eligibility, planning and simulated execution.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{active_profile, dashboard::current_balance};
use crate::auth::MerchantAuth;
use crate::error::ApiError;
use crate::state::AppState;
use crate::yield_opt::{AllocationPlan, Eligibility, RiskTolerance, YieldExecutionReport};

#[derive(Debug, Deserialize, IntoParams)]
pub struct EligibilityQuery {
    /// Balance to check; defaults to the merchant's current USDC balance
    pub balance: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AllocateRequest {
    /// USDC amount to allocate
    pub amount: f64,
    /// Defaults to the merchant's configured risk tolerance
    #[serde(default)]
    pub risk_tolerance: Option<RiskTolerance>,
}

/// Whether a balance qualifies for yield.
#[utoipa::path(
    get,
    path = "/v1/yield/eligibility",
    tag = "Yield",
    params(EligibilityQuery),
    responses(
        (status = 200, description = "Eligibility", body = Eligibility),
        (status = 503, description = "Balance unavailable")
    ),
    security(("bearer_auth" = []))
)]
pub async fn eligibility(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
    Query(query): Query<EligibilityQuery>,
) -> Result<Json<Eligibility>, ApiError> {
    let profile = active_profile(&state, &merchant.wallet_address)?;
    let balance = match query.balance {
        Some(balance) => balance,
        None => current_balance(&state, &profile).await?.as_f64(),
    };
    Ok(Json(state.yield_optimizer.eligibility(balance)))
}

/// Allocation plan for an amount. Nothing is executed.
#[utoipa::path(
    post,
    path = "/v1/yield/allocate",
    tag = "Yield",
    request_body = AllocateRequest,
    responses(
        (status = 200, description = "Allocation plan", body = AllocationPlan),
        (status = 400, description = "Invalid or ineligible amount")
    ),
    security(("bearer_auth" = []))
)]
pub async fn allocate(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
    Json(request): Json<AllocateRequest>,
) -> Result<Json<AllocationPlan>, ApiError> {
    let profile = active_profile(&state, &merchant.wallet_address)?;
    let risk = request.risk_tolerance.unwrap_or(profile.risk_tolerance);
    let plan = state.yield_optimizer.plan(request.amount, risk)?;
    Ok(Json(plan))
}

/// Plan and run a simulated allocation.
#[utoipa::path(
    post,
    path = "/v1/yield/execute",
    tag = "Yield",
    request_body = AllocateRequest,
    responses(
        (status = 200, description = "Execution report; `success` is false if a deposit failed", body = YieldExecutionReport),
        (status = 400, description = "Invalid or ineligible amount")
    ),
    security(("bearer_auth" = []))
)]
pub async fn execute(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
    Json(request): Json<AllocateRequest>,
) -> Result<Json<YieldExecutionReport>, ApiError> {
    let profile = active_profile(&state, &merchant.wallet_address)?;
    let risk = request.risk_tolerance.unwrap_or(profile.risk_tolerance);
    let report = state.yield_optimizer.optimize(request.amount, risk).await?;
    info!(
        wallet_address = %profile.wallet_address,
        success = report.success,
        deposits = report.deposits.len(),
        "Yield execution finished"
    );
    Ok(Json(report))
}
