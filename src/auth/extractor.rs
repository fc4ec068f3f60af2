// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Axum extractor for authenticated merchants.
//!
//! ```rust,ignore
//! async fn my_handler(MerchantAuth(merchant): MerchantAuth) -> impl IntoResponse {
//!     // merchant.wallet_address is the verified wallet
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::Utc;

use super::AuthError;
use crate::state::AppState;
use crate::storage::{MerchantSession, SessionRepository};

/// Wallet behind a valid session.
#[derive(Debug, Clone)]
pub struct AuthenticatedMerchant {
    /// Lowercase wallet address
    pub wallet_address: String,
    /// Hash of the presented bearer token
    pub token_hash: String,
    pub session: MerchantSession,
}

impl From<MerchantSession> for AuthenticatedMerchant {
    fn from(session: MerchantSession) -> Self {
        Self {
            wallet_address: session.wallet_address.clone(),
            token_hash: session.token_hash.clone(),
            session,
        }
    }
}

/// Extract the raw bearer token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Extractor requiring a valid session.
///
/// The session cache is consulted first; on a miss the session is read from
/// the database and cached. Expired sessions are rejected either way.
pub struct MerchantAuth(pub AuthenticatedMerchant);

impl FromRequestParts<AppState> for MerchantAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(merchant) = parts.extensions.get::<AuthenticatedMerchant>().cloned() {
            return Ok(MerchantAuth(merchant));
        }

        let token = bearer_token(&parts.headers)?;
        let token_hash = state.tokens.hash(token);

        let session = match state.session_cache.get(&token_hash) {
            Some(session) => session,
            None => {
                let session = SessionRepository::new(&state.db)
                    .get_active(&token_hash, Utc::now())?
                    .ok_or(AuthError::SessionNotFound)?;
                state.session_cache.put(session.clone());
                session
            }
        };

        let merchant = AuthenticatedMerchant::from(session);
        parts.extensions.insert(merchant.clone());
        Ok(MerchantAuth(merchant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::{generate_token, new_session};
    use crate::state::test_state;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/v1/merchants/me");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(None);
        let result = MerchantAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn non_bearer_header_is_rejected() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(Some("Basic abc"));
        let result = MerchantAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(Some("Bearer deadbeef"));
        let result = MerchantAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    async fn stored_session_authenticates_and_is_cached() {
        let (state, _dir) = test_state();
        let token = generate_token();
        let hash = state.tokens.hash(&token);
        let session = new_session("0xABC", hash.clone(), chrono::Duration::hours(1), None, Utc::now());
        SessionRepository::new(&state.db).create(&session).unwrap();

        let header = format!("Bearer {token}");
        let mut parts = parts_with(Some(&header));
        let MerchantAuth(merchant) = MerchantAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();

        assert_eq!(merchant.wallet_address, "0xabc");
        assert!(state.session_cache.get(&hash).is_some());
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let (state, _dir) = test_state();
        let token = generate_token();
        let hash = state.tokens.hash(&token);
        let session = new_session(
            "0xabc",
            hash,
            chrono::Duration::seconds(-1),
            None,
            Utc::now(),
        );
        SessionRepository::new(&state.db).create(&session).unwrap();

        let header = format!("Bearer {token}");
        let mut parts = parts_with(Some(&header));
        let result = MerchantAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::SessionNotFound)));
    }
}
