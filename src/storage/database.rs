// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Embedded gateway database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `profiles`: lowercase wallet address → serialized MerchantProfile
//! - `merchant_ids`: merchant id (`HT-###`) → wallet address
//! - `sessions`: token hash → serialized MerchantSession
//! - `wallet_sessions`: `wallet|token_hash` → expiry (unix millis)
//! - `transactions`: tx hash → serialized MerchantTransaction
//! - `merchant_tx_index`: `wallet|!timestamp_be|tx_hash` → status
//! - `in_flight_txs`: tx hash → merchant wallet, for non-terminal payments

use std::path::Path;

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};

/// Primary profile table.
pub(crate) const PROFILES: TableDefinition<&str, &[u8]> = TableDefinition::new("profiles");

/// Merchant id uniqueness table.
pub(crate) const MERCHANT_IDS: TableDefinition<&str, &str> = TableDefinition::new("merchant_ids");

/// Primary session table, keyed by token hash.
pub(crate) const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Per-wallet session index for supersede on re-auth.
pub(crate) const WALLET_SESSIONS: TableDefinition<&str, i64> =
    TableDefinition::new("wallet_sessions");

/// Primary transaction table.
pub(crate) const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");

/// Newest-first listing index per merchant wallet.
pub(crate) const MERCHANT_TX_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("merchant_tx_index");

/// Payments not yet in a terminal status.
pub(crate) const IN_FLIGHT_TXS: TableDefinition<&str, &str> = TableDefinition::new("in_flight_txs");

/// Scratch table written by the health check.
const HEALTH: TableDefinition<&str, i64> = TableDefinition::new("health");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("no free merchant id after {0} attempts")]
    MerchantIdExhausted(u32),

    #[error("storage task failed: {0}")]
    Task(String),
}

impl DbError {
    /// Whether retrying the same operation could succeed.
    ///
    /// Domain outcomes (missing rows, conflicts, bad transitions, id
    /// exhaustion) and serialization failures are final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Redb(_)
                | DbError::RedbDatabase(_)
                | DbError::RedbTransaction(_)
                | DbError::RedbStorage(_)
                | DbError::RedbCommit(_)
                | DbError::Task(_)
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// GatewayDatabase
// =============================================================================

/// Embedded ACID store for profiles, sessions and transactions.
pub struct GatewayDatabase {
    db: Database,
}

impl GatewayDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PROFILES)?;
            let _ = write_txn.open_table(MERCHANT_IDS)?;
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(WALLET_SESSIONS)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(MERCHANT_TX_INDEX)?;
            let _ = write_txn.open_table(IN_FLIGHT_TXS)?;
            let _ = write_txn.open_table(HEALTH)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(crate) fn begin_read(&self) -> DbResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    pub(crate) fn begin_write(&self) -> DbResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Round-trip a write and a read to prove the store is usable.
    pub fn health_check(&self) -> DbResult<()> {
        let now = chrono::Utc::now().timestamp();
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(HEALTH)?;
            table.insert("last_probe", now)?;
        }
        write_txn.commit()?;

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HEALTH)?;
        match table.get("last_probe")? {
            Some(_) => Ok(()),
            None => Err(DbError::NotFound("health probe".to_string())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn temp_db() -> (GatewayDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = GatewayDatabase::open(&dir.path().join("gateway.redb")).unwrap();
        (db, dir)
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("gateway.redb");
        GatewayDatabase::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn health_check_passes_on_fresh_database() {
        let (db, _dir) = temp_db();
        db.health_check().unwrap();
    }

    #[test]
    fn domain_errors_are_not_transient() {
        assert!(!DbError::NotFound("x".into()).is_transient());
        assert!(!DbError::AlreadyExists("x".into()).is_transient());
        assert!(!DbError::InvalidTransition("x".into()).is_transient());
        assert!(!DbError::MerchantIdExhausted(10).is_transient());
        assert!(DbError::Task("join".into()).is_transient());
    }
}
