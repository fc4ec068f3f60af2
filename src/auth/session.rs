// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Opaque session tokens.
//!
//! A token is 32 random bytes, hex encoded, handed to the client once. Only
//! `HMAC-SHA256(SESSION_SECRET, token)` is persisted, so a leaked database
//! does not yield usable bearer tokens.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use k256::elliptic_curve::rand_core::{OsRng, RngCore};
use sha2::Sha256;

use crate::storage::{MerchantProfile, MerchantSession};

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Random bytes per token.
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Generate a fresh bearer token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    alloy::hex::encode(bytes)
}

/// Keyed hashing of bearer tokens.
#[derive(Clone)]
pub struct TokenHasher {
    mac: HmacSha256,
}

impl TokenHasher {
    pub fn new(secret: &[u8]) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
        })
    }

    /// Hex HMAC of the token.
    pub fn hash(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        alloy::hex::encode(mac.finalize().into_bytes())
    }
}

/// Build the session row for a freshly verified wallet.
pub fn new_session(
    wallet_address: &str,
    token_hash: String,
    ttl: Duration,
    profile: Option<&MerchantProfile>,
    now: DateTime<Utc>,
) -> MerchantSession {
    MerchantSession {
        token_hash,
        wallet_address: wallet_address.to_lowercase(),
        expires_at: now + ttl,
        circle_wallet_id: profile.and_then(|p| p.circle_wallet_id.clone()),
        circle_wallet_address: profile.and_then(|p| p.circle_wallet_address.clone()),
        profile_complete: profile.is_some_and(|p| p.is_active),
        created_at: now,
    }
}
