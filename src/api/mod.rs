// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

use axum::{
    body::Body,
    http::{HeaderName, Request},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::Challenge,
    blockchain::SettlementBalance,
    error::ApiError,
    providers::{BridgeState, BridgeStatus, CustodialWallet, SignedTransaction, TokenBalance},
    routing::{RankedRoute, Route, RouteStep},
    state::AppState,
    storage::{
        is_valid_merchant_id, with_retry, MerchantProfile, MerchantStats, MerchantTransaction,
        ProfileRepository, ProfileUpdate, SessionRepository, TxStatus,
    },
    yield_opt::{
        Allocation, AllocationPlan, DepositReceipt, Eligibility, RiskTolerance,
        YieldExecutionReport,
    },
};

pub mod auth;
pub mod bridge;
pub mod dashboard;
pub mod health;
pub mod merchants;
pub mod tokens;
pub mod transactions;
pub mod wallet;
pub mod yield_opt;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/challenge", get(auth::challenge))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/session", get(auth::session))
        .route("/auth/logout", post(auth::logout))
        .route("/merchants", post(merchants::onboard))
        .route(
            "/merchants/me",
            get(merchants::get_me)
                .put(merchants::update_me)
                .delete(merchants::deactivate_me),
        )
        .route(
            "/merchants/by-id/{merchant_id}",
            get(merchants::get_by_merchant_id),
        )
        .route("/wallet", post(wallet::create_wallet))
        .route("/wallet/sign", post(wallet::sign_transaction))
        .route("/wallet/{wallet_id}/balance", get(wallet::wallet_balance))
        .route("/balance/settlement", get(wallet::settlement_balance))
        .route("/bridge/routes", post(bridge::routes))
        .route("/bridge/execute", post(bridge::execute))
        .route("/bridge/status", get(bridge::status))
        .route("/tokens/{address}/balances", get(tokens::token_balances))
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::record_transaction),
        )
        .route("/transactions/{tx_hash}", get(transactions::get_transaction))
        .route(
            "/transactions/{tx_hash}/status",
            put(transactions::update_status),
        )
        .route("/dashboard", get(dashboard::dashboard))
        .route("/yield/eligibility", get(yield_opt::eligibility))
        .route("/yield/allocate", post(yield_opt::allocate))
        .route("/yield/execute", post(yield_opt::execute));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

// =============================================================================
// Shared handler helpers
// =============================================================================

/// The caller's profile, which must exist and be active.
pub(crate) fn active_profile(state: &AppState, wallet: &str) -> Result<MerchantProfile, ApiError> {
    let profile = ProfileRepository::new(&state.db)
        .get(wallet)?
        .ok_or_else(|| ApiError::not_found("Merchant profile not found"))?;
    if !profile.is_active {
        return Err(ApiError::forbidden("Merchant account is deactivated"));
    }
    Ok(profile)
}

/// Resolve a public merchant id to an active profile.
pub(crate) fn resolve_merchant(
    state: &AppState,
    merchant_id: &str,
) -> Result<MerchantProfile, ApiError> {
    let merchant_id = merchant_id.trim().to_ascii_uppercase();
    if !is_valid_merchant_id(&merchant_id) {
        return Err(ApiError::bad_request(format!("Invalid merchant id `{merchant_id}`")));
    }
    ProfileRepository::new(&state.db)
        .get_by_merchant_id(&merchant_id)?
        .ok_or_else(|| ApiError::not_found(format!("Merchant {merchant_id} not found")))
}

/// Push profile changes into the wallet's sessions and drop cached copies.
pub(crate) async fn refresh_sessions(
    state: &AppState,
    profile: &MerchantProfile,
) -> Result<(), ApiError> {
    let repo = SessionRepository::new(&state.db);
    with_retry(state.retry, || {
        repo.refresh_profile(
            &profile.wallet_address,
            profile.is_active,
            profile.circle_wallet_id.as_deref(),
            profile.circle_wallet_address.as_deref(),
        )
    })
    .await?;
    state.session_cache.invalidate_wallet(&profile.wallet_address);
    Ok(())
}

// =============================================================================
// OpenAPI
// =============================================================================

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::challenge,
        auth::verify,
        auth::session,
        auth::logout,
        merchants::onboard,
        merchants::get_me,
        merchants::update_me,
        merchants::deactivate_me,
        merchants::get_by_merchant_id,
        wallet::create_wallet,
        wallet::wallet_balance,
        wallet::sign_transaction,
        wallet::settlement_balance,
        bridge::routes,
        bridge::execute,
        bridge::status,
        tokens::token_balances,
        transactions::list_transactions,
        transactions::record_transaction,
        transactions::get_transaction,
        transactions::update_status,
        dashboard::dashboard,
        yield_opt::eligibility,
        yield_opt::allocate,
        yield_opt::execute
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            Challenge,
            auth::VerifyRequest,
            auth::SessionResponse,
            auth::SessionInfo,
            MerchantProfile,
            ProfileUpdate,
            RiskTolerance,
            merchants::OnboardingRequest,
            merchants::PublicMerchant,
            CustodialWallet,
            SignedTransaction,
            TokenBalance,
            SettlementBalance,
            wallet::WalletBalanceResponse,
            wallet::SignRequest,
            Route,
            RouteStep,
            RankedRoute,
            BridgeState,
            BridgeStatus,
            bridge::QuoteRequest,
            bridge::RoutesResponse,
            bridge::ExecuteResponse,
            tokens::TokenBalancesResponse,
            MerchantTransaction,
            TxStatus,
            MerchantStats,
            transactions::TransactionListResponse,
            transactions::RecordTransactionRequest,
            transactions::UpdateStatusRequest,
            dashboard::DashboardResponse,
            dashboard::MerchantBalance,
            dashboard::BalanceSource,
            Eligibility,
            Allocation,
            AllocationPlan,
            DepositReceipt,
            YieldExecutionReport,
            yield_opt::AllocateRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Auth", description = "Wallet signature sign-in and sessions"),
        (name = "Merchants", description = "Onboarding, settings and public lookup"),
        (name = "Wallet", description = "Custodial wallet and settlement balance"),
        (name = "Bridge", description = "Payer route quotes and transfer status"),
        (name = "Tokens", description = "Payer token balances"),
        (name = "Transactions", description = "Merchant payment history"),
        (name = "Dashboard", description = "Merchant overview"),
        (name = "Yield", description = "Simulated yield allocation")
    )
)]
struct ApiDoc;
