// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;
use crate::storage::DbError;

/// Upper bound on the database probe.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Database probe: "ok", "error" or "timeout".
    pub database: String,
    /// Whether custodial wallets are available.
    pub circle: String,
    /// Whether payer token balances are available.
    pub token_balances: String,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Probe the database off the async runtime, giving up after `timeout`.
async fn check_database(state: &AppState, timeout: Duration) -> &'static str {
    let db = state.db.clone();
    let probe = tokio::task::spawn_blocking(move || db.health_check());
    match tokio::time::timeout(timeout, probe).await {
        Ok(Ok(Ok(()))) => "ok",
        Ok(Ok(Err(e))) => {
            tracing::error!(error = %e, "Database health probe failed");
            "error"
        }
        Ok(Err(join)) => {
            tracing::error!(error = %DbError::from(join), "Database health probe panicked");
            "error"
        }
        Err(_) => {
            tracing::error!(timeout_secs = timeout.as_secs(), "Database health probe timed out");
            "timeout"
        }
    }
}

fn configured(present: bool) -> String {
    if present { "ok" } else { "not_configured" }.to_string()
}

async fn readiness_report(state: &AppState) -> (StatusCode, Json<ReadyResponse>) {
    let database = check_database(state, HEALTH_TIMEOUT).await;
    let all_ok = database == "ok";

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            database: database.to_string(),
            circle: configured(state.wallets.is_some()),
            token_balances: configured(state.token_balances.is_some()),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Health check endpoint handler.
///
/// Returns 200 if the database answers within 5 s, 503 otherwise. Optional
/// vendors are reported but never fail the check.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    readiness_report(&state).await
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    readiness_report(&state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;

    #[tokio::test]
    async fn healthy_database_reports_ok() {
        let (state, _dir) = test_state();
        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.checks.database, "ok");
        assert_eq!(body.checks.circle, "not_configured");
    }

    #[tokio::test]
    async fn liveness_always_ok() {
        assert_eq!(liveness().await.0.status, "ok");
    }
}
