// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Wallet sign-in: challenge, verify, session, logout.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::auth::{
    generate_token, new_session, parse_address, verify_signer, AuthError, Challenge, MerchantAuth,
};
use crate::state::AppState;
use crate::storage::{with_retry, ProfileRepository, SessionRepository};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChallengeQuery {
    /// Wallet address (`0x` + 40 hex)
    pub address: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub address: String,
    /// Challenge text exactly as returned by `/v1/auth/challenge`
    pub message: String,
    /// `personal_sign` signature, 65 bytes hex
    pub signature: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Bearer token; shown once
    pub token: String,
    pub wallet_address: String,
    pub expires_at: DateTime<Utc>,
    pub profile_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionInfo {
    pub wallet_address: String,
    pub expires_at: DateTime<Utc>,
    pub profile_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_wallet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_wallet_address: Option<String>,
}

/// Issue a sign-in challenge for a wallet.
#[utoipa::path(
    get,
    path = "/v1/auth/challenge",
    tag = "Auth",
    params(ChallengeQuery),
    responses(
        (status = 200, description = "Challenge to sign", body = Challenge),
        (status = 400, description = "Invalid address")
    )
)]
pub async fn challenge(
    State(state): State<AppState>,
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<Challenge>, AuthError> {
    parse_address(&query.address)?;
    Ok(Json(state.challenges.issue(&query.address, Utc::now())))
}

/// Verify a signed challenge and start a session.
///
/// Earlier sessions of the same wallet are revoked.
#[utoipa::path(
    post,
    path = "/v1/auth/verify",
    tag = "Auth",
    request_body = VerifyRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Invalid address or challenge"),
        (status = 401, description = "Signature does not match the address")
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AuthError> {
    let address = parse_address(&request.address)?;
    let now = Utc::now();
    state
        .challenges
        .verify(&request.message, &request.address, now)?;
    verify_signer(&request.message, &request.signature, address)?;

    let wallet = request.address.trim().to_lowercase();
    let profile = ProfileRepository::new(&state.db).get(&wallet)?;

    let token = generate_token();
    let session = new_session(
        &wallet,
        state.tokens.hash(&token),
        state.session_ttl,
        profile.as_ref(),
        now,
    );

    let repo = SessionRepository::new(&state.db);
    let superseded = with_retry(state.retry, || repo.create(&session)).await?;
    for hash in &superseded {
        state.session_cache.invalidate(hash);
    }
    state.session_cache.put(session.clone());

    info!(
        wallet_address = %wallet,
        superseded = superseded.len(),
        profile_complete = session.profile_complete,
        "Merchant signed in"
    );

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            wallet_address: session.wallet_address,
            expires_at: session.expires_at,
            profile_complete: session.profile_complete,
            merchant_id: profile.filter(|p| p.is_active).map(|p| p.merchant_id),
        }),
    ))
}

/// Describe the current session.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    tag = "Auth",
    responses(
        (status = 200, description = "Session is valid", body = SessionInfo),
        (status = 401, description = "Missing, expired or unknown session")
    ),
    security(("bearer_auth" = []))
)]
pub async fn session(MerchantAuth(merchant): MerchantAuth) -> Json<SessionInfo> {
    let session = merchant.session;
    Json(SessionInfo {
        wallet_address: session.wallet_address,
        expires_at: session.expires_at,
        profile_complete: session.profile_complete,
        circle_wallet_id: session.circle_wallet_id,
        circle_wallet_address: session.circle_wallet_address,
    })
}

/// End the current session.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    responses(
        (status = 204, description = "Session deleted"),
        (status = 401, description = "Missing, expired or unknown session")
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    MerchantAuth(merchant): MerchantAuth,
) -> Result<StatusCode, AuthError> {
    state.session_cache.invalidate(&merchant.token_hash);
    let repo = SessionRepository::new(&state.db);
    with_retry(state.retry, || repo.delete(&merchant.token_hash)).await?;
    info!(wallet_address = %merchant.wallet_address, "Merchant signed out");
    Ok(StatusCode::NO_CONTENT)
}
