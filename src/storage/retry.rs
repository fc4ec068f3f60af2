// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Exponential backoff around database operations.
//!
//! Only [`DbError::is_transient`] failures are retried. Not-found, conflict and
//! validation errors return on the first attempt.

use std::time::Duration;

use super::database::{DbError, DbResult};

/// Attempt count and base delay for [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Three attempts, waiting 2 s then 4 s.
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(2),
    };

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Run `op`, retrying transient failures with exponential backoff.
pub async fn with_retry<T, F>(policy: RetryPolicy, mut op: F) -> DbResult<T>
where
    F: FnMut() -> DbResult<T>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Database operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// [`with_retry`] with the default policy.
pub async fn retry_default<T, F>(op: F) -> DbResult<T>
where
    F: FnMut() -> DbResult<T>,
{
    with_retry(RetryPolicy::DEFAULT, op).await
}

impl From<tokio::task::JoinError> for DbError {
    fn from(e: tokio::task::JoinError) -> Self {
        DbError::Task(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn default_backoff_doubles_from_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = with_retry(fast(), || {
            calls += 1;
            if calls < 3 {
                Err(DbError::Task("busy".into()))
            } else {
                Ok(calls)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn stops_at_attempt_cap() {
        let mut calls = 0;
        let result: DbResult<()> = with_retry(fast(), || {
            calls += 1;
            Err(DbError::Task("busy".into()))
        })
        .await;

        assert!(matches!(result, Err(DbError::Task(_))));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn does_not_retry_domain_errors() {
        let mut calls = 0;
        let result: DbResult<()> = with_retry(fast(), || {
            calls += 1;
            Err(DbError::NotFound("profile".into()))
        })
        .await;

        assert!(matches!(result, Err(DbError::NotFound(_))));
        assert_eq!(calls, 1);
    }
}
