// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Stateless sign-in challenges.
//!
//! The nonce is an HMAC over the address and issue time, so the server can
//! recognise its own challenges without storing them:
//!
//! ```text
//! Sign in to Hati
//!
//! Address: 0xabc...
//! Nonce: 3f9a...
//! Issued At: 2026-05-01T12:00:00Z
//! ```

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use hmac::Mac;
use serde::Serialize;
use utoipa::ToSchema;

use super::session::HmacSha256;
use super::AuthError;

/// How long a challenge may be signed after issue.
pub const CHALLENGE_TTL_SECS: i64 = 300;

const HEADER: &str = "Sign in to Hati";
const ADDRESS_PREFIX: &str = "Address: ";
const NONCE_PREFIX: &str = "Nonce: ";
const ISSUED_PREFIX: &str = "Issued At: ";

/// Message handed to the wallet for signing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Challenge {
    pub message: String,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks challenges.
#[derive(Clone)]
pub struct ChallengeIssuer {
    mac: HmacSha256,
    ttl: Duration,
}

impl ChallengeIssuer {
    pub fn new(secret: &[u8]) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
            ttl: Duration::seconds(CHALLENGE_TTL_SECS),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn nonce(&self, address: &str, issued_at: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(b"hati-challenge|");
        mac.update(address.as_bytes());
        mac.update(b"|");
        mac.update(issued_at.as_bytes());
        let digest = mac.finalize().into_bytes();
        alloy::hex::encode(&digest[..16])
    }

    /// Challenge for `address` (lowercased) issued at `now`.
    pub fn issue(&self, address: &str, now: DateTime<Utc>) -> Challenge {
        let address = address.to_lowercase();
        let issued = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let nonce = self.nonce(&address, &issued);
        let message = format!(
            "{HEADER}\n\n{ADDRESS_PREFIX}{address}\n{NONCE_PREFIX}{nonce}\n{ISSUED_PREFIX}{issued}"
        );
        // Round-trip through the formatted string so `issued_at` matches the message
        let issued_at = DateTime::parse_from_rfc3339(&issued)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(now);
        Challenge {
            message,
            nonce,
            issued_at,
            expires_at: issued_at + self.ttl,
        }
    }

    /// Check that `message` is an unexpired challenge issued for `address`.
    pub fn verify(&self, message: &str, address: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let mut lines = message.lines();
        if lines.next() != Some(HEADER) {
            return Err(AuthError::InvalidChallenge);
        }

        let mut claimed_address = None;
        let mut nonce = None;
        let mut issued = None;
        for line in lines {
            if let Some(v) = line.strip_prefix(ADDRESS_PREFIX) {
                claimed_address = Some(v);
            } else if let Some(v) = line.strip_prefix(NONCE_PREFIX) {
                nonce = Some(v);
            } else if let Some(v) = line.strip_prefix(ISSUED_PREFIX) {
                issued = Some(v);
            }
        }
        let (Some(claimed_address), Some(nonce), Some(issued)) = (claimed_address, nonce, issued)
        else {
            return Err(AuthError::InvalidChallenge);
        };

        if !claimed_address.eq_ignore_ascii_case(address) {
            return Err(AuthError::AddressMismatch);
        }

        let expected = self.nonce(&claimed_address.to_lowercase(), issued);
        if !constant_time_eq(expected.as_bytes(), nonce.as_bytes()) {
            return Err(AuthError::InvalidChallenge);
        }

        let issued_at = DateTime::parse_from_rfc3339(issued)
            .map_err(|_| AuthError::InvalidChallenge)?
            .with_timezone(&Utc);
        if now > issued_at + self.ttl {
            return Err(AuthError::ChallengeExpired);
        }
        Ok(())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
