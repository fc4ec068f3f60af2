// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::providers::ProviderError;
use crate::storage::DbError;
use crate::yield_opt::YieldError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Vendor failure with `context` prefixed to the upstream message,
    /// e.g. `"Failed to fetch routes: No available quotes"`.
    pub fn from_provider(context: &str, err: ProviderError) -> Self {
        let mut api = ApiError::from(err);
        api.message = format!("{context}: {}", api.message);
        api
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidRequest(m) => ApiError::bad_request(m),
            ProviderError::Unauthorized(m) => ApiError::unauthorized(m),
            ProviderError::NotFound(m) => ApiError::not_found(m),
            ProviderError::RateLimited(m) => ApiError::too_many_requests(m),
            ProviderError::NotConfigured(vendor) => {
                ApiError::service_unavailable(format!("{vendor} is not configured"))
            }
            ProviderError::Upstream { message, .. } => ApiError::internal(message),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(m) => ApiError::not_found(format!("{m} not found")),
            DbError::AlreadyExists(m) => ApiError::conflict(format!("{m} already exists")),
            DbError::InvalidTransition(m) => ApiError::conflict(m),
            DbError::MerchantIdExhausted(_) => {
                ApiError::service_unavailable("Could not allocate a merchant id, try again")
            }
            other => {
                tracing::error!(error = %other, "Database error");
                ApiError::internal("Database error")
            }
        }
    }
}

impl From<YieldError> for ApiError {
    fn from(err: YieldError) -> Self {
        match err {
            YieldError::InvalidAmount(_)
            | YieldError::BelowMinimum { .. }
            | YieldError::NotEnoughProtocols { .. } => ApiError::bad_request(err.to_string()),
            YieldError::Execution { .. } => ApiError::internal(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(err.status_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        assert_eq!(ApiError::conflict("x").status, StatusCode::CONFLICT);
        assert_eq!(ApiError::forbidden("x").status, StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::service_unavailable("x").status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[test]
    fn provider_errors_map_to_statuses() {
        let cases = [
            (ProviderError::InvalidRequest("a".into()), StatusCode::BAD_REQUEST),
            (ProviderError::Unauthorized("a".into()), StatusCode::UNAUTHORIZED),
            (ProviderError::NotFound("a".into()), StatusCode::NOT_FOUND),
            (ProviderError::RateLimited("a".into()), StatusCode::TOO_MANY_REQUESTS),
            (ProviderError::NotConfigured("Circle"), StatusCode::SERVICE_UNAVAILABLE),
            (
                ProviderError::Upstream { status: 502, message: "a".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ProviderError::Transport("a".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn provider_context_is_prefixed() {
        let err = ApiError::from_provider(
            "Failed to fetch routes",
            ProviderError::Upstream { status: 500, message: "No available quotes".into() },
        );
        assert_eq!(err.message, "Failed to fetch routes: No available quotes");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn db_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(DbError::AlreadyExists("Profile".into())).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(DbError::NotFound("Transaction".into())).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DbError::InvalidTransition("done".into())).status,
            StatusCode::CONFLICT
        );
        let internal = ApiError::from(DbError::Task("panicked".into()));
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message, "Database error");
    }

    #[test]
    fn yield_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(YieldError::InvalidAmount(-1.0)).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(YieldError::Execution {
                protocol: "Aave V3".into(),
                message: "boom".into()
            })
            .status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
