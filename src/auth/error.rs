// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Session unknown, logged out, superseded or expired
    SessionNotFound,
    /// Not a 20-byte hex address
    InvalidAddress,
    /// Challenge text was not issued by this server
    InvalidChallenge,
    /// Challenge is older than its lifetime
    ChallengeExpired,
    /// Signature bytes could not be parsed or recovered
    InvalidSignature,
    /// Signature recovers to a different wallet
    AddressMismatch,
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::InvalidAddress => "invalid_address",
            AuthError::InvalidChallenge => "invalid_challenge",
            AuthError::ChallengeExpired => "challenge_expired",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::AddressMismatch => "address_mismatch",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidAddress => StatusCode::BAD_REQUEST,
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::SessionNotFound
            | AuthError::InvalidChallenge
            | AuthError::ChallengeExpired
            | AuthError::InvalidSignature
            | AuthError::AddressMismatch => StatusCode::UNAUTHORIZED,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::SessionNotFound => write!(f, "Session expired or not found"),
            AuthError::InvalidAddress => write!(f, "Invalid wallet address"),
            AuthError::InvalidChallenge => write!(f, "Challenge message was not issued by this server"),
            AuthError::ChallengeExpired => write!(f, "Challenge has expired, request a new one"),
            AuthError::InvalidSignature => write!(f, "Signature is invalid"),
            AuthError::AddressMismatch => {
                write!(f, "Signature does not match the wallet address")
            }
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<crate::storage::DbError> for AuthError {
    fn from(e: crate::storage::DbError) -> Self {
        AuthError::InternalError(e.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Authentication failed internally");
        }
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn expired_session_reads_as_not_found() {
        let response = AuthError::SessionNotFound.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error"], "Session expired or not found");
    }

    #[test]
    fn bad_address_is_client_error() {
        assert_eq!(AuthError::InvalidAddress.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::InternalError("db".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
