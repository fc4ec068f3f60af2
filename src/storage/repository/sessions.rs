// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Merchant session repository.
//!
//! Sessions are keyed by the HMAC hash of the bearer token; the raw token is
//! never stored. A session whose `expires_at` has passed is treated as absent
//! even while its row still exists. Expired rows are only removed by
//! [`SessionRepository::purge_expired`].

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{DbResult, GatewayDatabase, SESSIONS, WALLET_SESSIONS};

/// Stored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MerchantSession {
    /// HMAC-SHA256 of the bearer token, hex
    pub token_hash: String,
    /// Authenticated wallet, lowercase
    pub wallet_address: String,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_wallet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_wallet_address: Option<String>,
    /// Whether onboarding had completed when the session was last refreshed
    pub profile_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl MerchantSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

fn wallet_key(wallet_address: &str, token_hash: &str) -> String {
    format!("{}|{}", wallet_address.to_lowercase(), token_hash)
}

/// `[start, end)` covering every `wallet|...` key. `}` sorts right after `|`.
fn wallet_range(wallet_address: &str) -> (String, String) {
    let wallet = wallet_address.to_lowercase();
    (format!("{wallet}|"), format!("{wallet}}}"))
}

/// Repository for merchant sessions.
pub struct SessionRepository<'a> {
    db: &'a GatewayDatabase,
}

impl<'a> SessionRepository<'a> {
    pub fn new(db: &'a GatewayDatabase) -> Self {
        Self { db }
    }

    /// Store a new session and delete every other session of the same wallet.
    ///
    /// Returns the token hashes that were superseded so callers can evict
    /// them from caches.
    pub fn create(&self, session: &MerchantSession) -> DbResult<Vec<String>> {
        let wallet = session.wallet_address.to_lowercase();
        let (start, end) = wallet_range(&wallet);

        let write_txn = self.db.begin_write()?;
        let superseded = {
            let mut index = write_txn.open_table(WALLET_SESSIONS)?;
            let mut sessions = write_txn.open_table(SESSIONS)?;

            let mut superseded = Vec::new();
            for entry in index.range(start.as_str()..end.as_str())? {
                let (key, _) = entry?;
                if let Some((_, hash)) = key.value().split_once('|') {
                    superseded.push(hash.to_string());
                }
            }
            for hash in &superseded {
                sessions.remove(hash.as_str())?;
                index.remove(wallet_key(&wallet, hash).as_str())?;
            }

            let mut stored = session.clone();
            stored.wallet_address = wallet.clone();
            let json = serde_json::to_vec(&stored)?;
            sessions.insert(stored.token_hash.as_str(), json.as_slice())?;
            index.insert(
                wallet_key(&wallet, &stored.token_hash).as_str(),
                stored.expires_at.timestamp_millis(),
            )?;
            superseded
        };
        write_txn.commit()?;
        Ok(superseded)
    }

    /// Fetch a session by token hash, ignoring it if expired at `now`.
    pub fn get_active(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<MerchantSession>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;
        let Some(value) = table.get(token_hash)? else {
            return Ok(None);
        };
        let session: MerchantSession = serde_json::from_slice(value.value())?;
        if session.is_expired_at(now) {
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Delete one session. Returns whether a row was removed.
    pub fn delete(&self, token_hash: &str) -> DbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut sessions = write_txn.open_table(SESSIONS)?;
            let wallet = match sessions.remove(token_hash)? {
                Some(value) => {
                    let session: MerchantSession = serde_json::from_slice(value.value())?;
                    Some(session.wallet_address)
                }
                None => None,
            };
            if let Some(wallet) = &wallet {
                let mut index = write_txn.open_table(WALLET_SESSIONS)?;
                index.remove(wallet_key(wallet, token_hash).as_str())?;
            }
            wallet.is_some()
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Update denormalized profile fields on every session of a wallet.
    pub fn refresh_profile(
        &self,
        wallet_address: &str,
        profile_complete: bool,
        circle_wallet_id: Option<&str>,
        circle_wallet_address: Option<&str>,
    ) -> DbResult<usize> {
        let (start, end) = wallet_range(wallet_address);
        let write_txn = self.db.begin_write()?;
        let updated = {
            let index = write_txn.open_table(WALLET_SESSIONS)?;
            let mut sessions = write_txn.open_table(SESSIONS)?;

            let mut hashes = Vec::new();
            for entry in index.range(start.as_str()..end.as_str())? {
                let (key, _) = entry?;
                if let Some((_, hash)) = key.value().split_once('|') {
                    hashes.push(hash.to_string());
                }
            }

            let mut updated = 0;
            for hash in hashes {
                let bytes = match sessions.get(hash.as_str())? {
                    Some(v) => v.value().to_vec(),
                    None => continue,
                };
                let mut session: MerchantSession = serde_json::from_slice(&bytes)?;
                session.profile_complete = profile_complete;
                session.circle_wallet_id = circle_wallet_id.map(str::to_string);
                session.circle_wallet_address = circle_wallet_address.map(str::to_string);
                let json = serde_json::to_vec(&session)?;
                sessions.insert(hash.as_str(), json.as_slice())?;
                updated += 1;
            }
            updated
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete every session expired at `now`. Returns the number removed.
    ///
    /// The index narrows the candidates; the stored session has the final
    /// say, so purge and [`Self::get_active`] agree on what is expired.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> DbResult<usize> {
        let cutoff = now.timestamp_millis();
        let write_txn = self.db.begin_write()?;
        let purged = {
            let mut index = write_txn.open_table(WALLET_SESSIONS)?;
            let mut sessions = write_txn.open_table(SESSIONS)?;

            let mut candidates = Vec::new();
            for entry in index.iter()? {
                let (key, expires_at) = entry?;
                if expires_at.value() <= cutoff {
                    candidates.push(key.value().to_string());
                }
            }

            let mut purged = 0;
            for key in &candidates {
                let Some((_, hash)) = key.split_once('|') else {
                    index.remove(key.as_str())?;
                    continue;
                };
                let stored = match sessions.get(hash)? {
                    Some(v) => Some(serde_json::from_slice::<MerchantSession>(v.value())?),
                    None => None,
                };
                match stored {
                    Some(session) if !session.is_expired_at(now) => {
                        index.insert(key.as_str(), session.expires_at.timestamp_millis())?;
                    }
                    Some(_) => {
                        index.remove(key.as_str())?;
                        sessions.remove(hash)?;
                        purged += 1;
                    }
                    None => {
                        index.remove(key.as_str())?;
                    }
                }
            }
            purged
        };
        write_txn.commit()?;
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_db;
    use chrono::Duration;

    fn session(hash: &str, wallet: &str, ttl: Duration) -> MerchantSession {
        let now = Utc::now();
        MerchantSession {
            token_hash: hash.to_string(),
            wallet_address: wallet.to_string(),
            expires_at: now + ttl,
            circle_wallet_id: None,
            circle_wallet_address: None,
            profile_complete: false,
            created_at: now,
        }
    }

    #[test]
    fn create_and_fetch_active_session() {
        let (db, _dir) = temp_db();
        let repo = SessionRepository::new(&db);
        repo.create(&session("h1", "0xABC", Duration::hours(1))).unwrap();

        let found = repo.get_active("h1", Utc::now()).unwrap().unwrap();
        assert_eq!(found.wallet_address, "0xabc");
    }

    #[test]
    fn expired_session_is_absent_while_row_exists() {
        let (db, _dir) = temp_db();
        let repo = SessionRepository::new(&db);
        repo.create(&session("h1", "0xabc", Duration::seconds(-5))).unwrap();

        assert!(repo.get_active("h1", Utc::now()).unwrap().is_none());
        // The row is still there until purged
        assert!(repo.delete("h1").unwrap());
    }

    #[test]
    fn expiry_is_judged_at_read_time() {
        let (db, _dir) = temp_db();
        let repo = SessionRepository::new(&db);
        let s = session("h1", "0xabc", Duration::minutes(10));
        repo.create(&s).unwrap();

        assert!(repo.get_active("h1", s.expires_at - Duration::seconds(1)).unwrap().is_some());
        assert!(repo.get_active("h1", s.expires_at).unwrap().is_none());
    }

    #[test]
    fn reauth_supersedes_previous_sessions() {
        let (db, _dir) = temp_db();
        let repo = SessionRepository::new(&db);
        repo.create(&session("old1", "0xabc", Duration::hours(1))).unwrap();
        repo.create(&session("other", "0xdef", Duration::hours(1))).unwrap();

        let superseded = repo.create(&session("new", "0xABC", Duration::hours(1))).unwrap();

        assert_eq!(superseded, vec!["old1".to_string()]);
        assert!(repo.get_active("old1", Utc::now()).unwrap().is_none());
        assert!(repo.get_active("new", Utc::now()).unwrap().is_some());
        assert!(repo.get_active("other", Utc::now()).unwrap().is_some());
    }

    #[test]
    fn delete_is_idempotent() {
        let (db, _dir) = temp_db();
        let repo = SessionRepository::new(&db);
        repo.create(&session("h1", "0xabc", Duration::hours(1))).unwrap();

        assert!(repo.delete("h1").unwrap());
        assert!(!repo.delete("h1").unwrap());
    }

    #[test]
    fn purge_removes_only_expired_rows() {
        let (db, _dir) = temp_db();
        let repo = SessionRepository::new(&db);
        repo.create(&session("dead", "0xaaa", Duration::seconds(-60))).unwrap();
        repo.create(&session("live", "0xbbb", Duration::hours(1))).unwrap();

        assert_eq!(repo.purge_expired(Utc::now()).unwrap(), 1);
        assert!(!repo.delete("dead").unwrap());
        assert!(repo.get_active("live", Utc::now()).unwrap().is_some());
    }

    #[test]
    fn purge_agrees_with_read_path_within_the_final_second() {
        let (db, _dir) = temp_db();
        let repo = SessionRepository::new(&db);
        let s = session("h1", "0xabc", Duration::minutes(10));
        repo.create(&s).unwrap();

        // Same wall-clock second as the expiry, but still before it
        let almost = s.expires_at - Duration::milliseconds(400);
        assert!(repo.get_active("h1", almost).unwrap().is_some());
        assert_eq!(repo.purge_expired(almost).unwrap(), 0);
        assert!(repo.get_active("h1", almost).unwrap().is_some());

        assert_eq!(repo.purge_expired(s.expires_at).unwrap(), 1);
        assert!(!repo.delete("h1").unwrap());
    }

    #[test]
    fn purge_rechecks_the_stored_expiry() {
        let (db, _dir) = temp_db();
        let repo = SessionRepository::new(&db);
        let s = session("h1", "0xabc", Duration::hours(1));
        repo.create(&s).unwrap();

        // An index entry that lags the row (e.g. seconds from an older build)
        {
            let write_txn = db.begin_write().unwrap();
            {
                let mut index = write_txn.open_table(WALLET_SESSIONS).unwrap();
                index
                    .insert(wallet_key("0xabc", "h1").as_str(), s.expires_at.timestamp())
                    .unwrap();
            }
            write_txn.commit().unwrap();
        }

        assert_eq!(repo.purge_expired(Utc::now()).unwrap(), 0);
        assert!(repo.get_active("h1", Utc::now()).unwrap().is_some());
    }

    #[test]
    fn refresh_profile_updates_wallet_sessions() {
        let (db, _dir) = temp_db();
        let repo = SessionRepository::new(&db);
        repo.create(&session("h1", "0xabc", Duration::hours(1))).unwrap();

        let n = repo
            .refresh_profile("0xABC", true, Some("w-9"), Some("0xc1"))
            .unwrap();
        assert_eq!(n, 1);

        let s = repo.get_active("h1", Utc::now()).unwrap().unwrap();
        assert!(s.profile_complete);
        assert_eq!(s.circle_wallet_id.as_deref(), Some("w-9"));
    }
}
