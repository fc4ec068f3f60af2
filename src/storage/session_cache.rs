// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! LRU cache for validated sessions.
//!
//! Avoids a redb read on every authenticated request. An entry lives for
//! `min(cache ttl, session expiry)` and is evicted on logout and when a
//! re-authentication supersedes the session.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use lru::LruCache;

use super::repository::sessions::MerchantSession;

struct CacheEntry {
    session: MerchantSession,
    inserted_at: Instant,
}

/// In-process cache keyed by token hash.
pub struct SessionCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl SessionCache {
    /// - `capacity`: max number of sessions held.
    /// - `ttl`: upper bound on how long an entry is trusted.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Cached session, or `None` when absent, stale or past its expiry.
    pub fn get(&self, token_hash: &str) -> Option<MerchantSession> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(token_hash) {
            if entry.inserted_at.elapsed() < self.ttl && !entry.session.is_expired_at(Utc::now()) {
                return Some(entry.session.clone());
            }
            cache.pop(token_hash);
        }
        None
    }

    pub fn put(&self, session: MerchantSession) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                session.token_hash.clone(),
                CacheEntry {
                    session,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, token_hash: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(token_hash);
        }
    }

    /// Evict every cached session of a wallet.
    pub fn invalidate_wallet(&self, wallet_address: &str) {
        let wallet = wallet_address.to_lowercase();
        if let Ok(mut cache) = self.cache.lock() {
            let stale: Vec<String> = cache
                .iter()
                .filter(|(_, entry)| entry.session.wallet_address == wallet)
                .map(|(hash, _)| hash.clone())
                .collect();
            for hash in stale {
                cache.pop(&hash);
            }
        }
    }
}
