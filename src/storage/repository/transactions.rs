// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Merchant payment log.
//!
//! Each payment is appended once when the payer initiates it. Status moves
//! strictly forward through `PENDING → PROCESSING → COMPLETED|FAILED|CANCELLED`;
//! steps may be skipped, but a status is never repeated or revisited and
//! terminal statuses are final.
//!
//! ## Index
//!
//! `merchant_tx_index` keys are `wallet | inverted_millis_be | tx_hash`, so a
//! forward range scan yields newest first. Cursors are the hex-encoded key of
//! the last row returned.
//!
//! `in_flight_txs` holds exactly the payments that are not yet terminal, so
//! the bridge poller never scans settled history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{
    DbError, DbResult, GatewayDatabase, IN_FLIGHT_TXS, MERCHANT_TX_INDEX, TRANSACTIONS,
};

/// Payment status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Completed | TxStatus::Failed | TxStatus::Cancelled)
    }

    /// Position in the lifecycle; terminal statuses share the last step.
    fn stage(self) -> u8 {
        match self {
            TxStatus::Pending => 0,
            TxStatus::Processing => 1,
            TxStatus::Completed | TxStatus::Failed | TxStatus::Cancelled => 2,
        }
    }

    /// Whether a payment in `self` may move to `next`.
    pub fn can_advance_to(self, next: TxStatus) -> bool {
        next.stage() > self.stage()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Pending => "PENDING",
            TxStatus::Processing => "PROCESSING",
            TxStatus::Completed => "COMPLETED",
            TxStatus::Failed => "FAILED",
            TxStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TxStatus::Pending),
            "PROCESSING" => Ok(TxStatus::Processing),
            "COMPLETED" => Ok(TxStatus::Completed),
            "FAILED" => Ok(TxStatus::Failed),
            "CANCELLED" => Ok(TxStatus::Cancelled),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Stored payment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MerchantTransaction {
    /// Source-chain transaction hash
    pub tx_hash: String,
    /// Receiving merchant wallet, lowercase
    pub merchant_wallet: String,
    pub source_chain: String,
    pub destination_chain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_token: Option<String>,
    /// Human-readable amount in the source token
    pub amount: String,
    pub usd_value: f64,
    pub status: TxStatus,
    /// Bridge or tool that carried the payment
    pub protocol: String,
    /// Measured end-to-end time, set on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_time_secs: Option<u64>,
    /// Estimate at initiation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_secs: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a payment is recorded.
#[derive(Debug, Clone, Default)]
pub struct NewTransaction {
    pub tx_hash: String,
    pub merchant_wallet: String,
    pub source_chain: String,
    pub destination_chain: String,
    pub source_token: Option<String>,
    pub amount: String,
    pub usd_value: f64,
    pub protocol: String,
    pub estimated_time_secs: Option<u64>,
}

impl MerchantTransaction {
    pub fn new_pending(new: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            tx_hash: new.tx_hash,
            merchant_wallet: new.merchant_wallet.to_lowercase(),
            source_chain: new.source_chain,
            destination_chain: new.destination_chain,
            source_token: new.source_token,
            amount: new.amount,
            usd_value: new.usd_value,
            status: TxStatus::Pending,
            protocol: new.protocol,
            bridge_time_secs: None,
            estimated_time_secs: new.estimated_time_secs,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Aggregates for a merchant dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct MerchantStats {
    pub total_transactions: u64,
    pub completed: u64,
    pub pending: u64,
    pub failed: u64,
    /// Sum of `usd_value` over completed payments
    pub total_volume_usd: f64,
    /// Mean measured bridge time over completed payments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_bridge_time_secs: Option<f64>,
}

// =============================================================================
// Index Key Helpers
// =============================================================================

fn make_index_key(wallet: &str, created_at: DateTime<Utc>, tx_hash: &str) -> Vec<u8> {
    let wallet = wallet.to_lowercase();
    let millis = created_at.timestamp_millis().max(0) as u64;
    let mut key = Vec::with_capacity(wallet.len() + 1 + 8 + 1 + tx_hash.len());
    key.extend_from_slice(wallet.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(u64::MAX - millis).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(tx_hash.as_bytes());
    key
}

fn make_prefix(wallet: &str) -> Vec<u8> {
    let mut prefix = wallet.to_lowercase().into_bytes();
    prefix.push(b'|');
    prefix
}

fn make_prefix_end(wallet: &str) -> Vec<u8> {
    let mut end = wallet.to_lowercase().into_bytes();
    end.push(b'|' + 1);
    end
}

/// The tx hash follows the fixed-width timestamp and its separator.
fn tx_hash_from_key(key: &[u8], prefix_len: usize) -> Option<&str> {
    let start = prefix_len + 8 + 1;
    key.get(start..).and_then(|rest| std::str::from_utf8(rest).ok())
}

fn encode_cursor(key: &[u8]) -> String {
    alloy::hex::encode(key)
}

fn decode_cursor(cursor: &str) -> Option<Vec<u8>> {
    alloy::hex::decode(cursor).ok()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for merchant payments.
pub struct TransactionRepository<'a> {
    db: &'a GatewayDatabase,
}

impl<'a> TransactionRepository<'a> {
    pub fn new(db: &'a GatewayDatabase) -> Self {
        Self { db }
    }

    /// Append a payment. A hash can only be recorded once.
    pub fn create(&self, tx: &MerchantTransaction) -> DbResult<()> {
        let json = serde_json::to_vec(tx)?;
        let key = make_index_key(&tx.merchant_wallet, tx.created_at, &tx.tx_hash);

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TRANSACTIONS)?;
            if table.get(tx.tx_hash.as_str())?.is_some() {
                return Err(DbError::AlreadyExists(format!("Transaction {}", tx.tx_hash)));
            }
            table.insert(tx.tx_hash.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(MERCHANT_TX_INDEX)?;
            index.insert(key.as_slice(), tx.status.as_str())?;

            if !tx.status.is_terminal() {
                let mut in_flight = write_txn.open_table(IN_FLIGHT_TXS)?;
                in_flight.insert(tx.tx_hash.as_str(), tx.merchant_wallet.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, tx_hash: &str) -> DbResult<Option<MerchantTransaction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS)?;
        match table.get(tx_hash)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Move a payment to `status`.
    ///
    /// Only forward moves are accepted: repeating the current status, going
    /// back, or leaving a terminal status is an invalid transition. On
    /// `COMPLETED` the measured
    /// bridge time defaults to the elapsed time since creation.
    pub fn update_status(
        &self,
        tx_hash: &str,
        status: TxStatus,
        bridge_time_secs: Option<u64>,
    ) -> DbResult<MerchantTransaction> {
        let write_txn = self.db.begin_write()?;
        let tx = {
            let mut table = write_txn.open_table(TRANSACTIONS)?;

            let existing_bytes = {
                let existing = table
                    .get(tx_hash)?
                    .ok_or_else(|| DbError::NotFound(format!("Transaction {tx_hash}")))?;
                existing.value().to_vec()
            };

            let mut tx: MerchantTransaction = serde_json::from_slice(&existing_bytes)?;
            if tx.status.is_terminal() {
                return Err(DbError::InvalidTransition(format!(
                    "{tx_hash} is already {}",
                    tx.status
                )));
            }
            if !tx.status.can_advance_to(status) {
                return Err(DbError::InvalidTransition(format!(
                    "{tx_hash} cannot move from {} to {status}",
                    tx.status
                )));
            }

            let now = Utc::now();
            tx.status = status;
            if status == TxStatus::Completed {
                let measured = (now - tx.created_at).num_seconds().max(0) as u64;
                tx.bridge_time_secs = Some(bridge_time_secs.unwrap_or(measured));
            } else if bridge_time_secs.is_some() {
                tx.bridge_time_secs = bridge_time_secs;
            }
            tx.updated_at = now;

            let json = serde_json::to_vec(&tx)?;
            table.insert(tx_hash, json.as_slice())?;

            let mut index = write_txn.open_table(MERCHANT_TX_INDEX)?;
            let key = make_index_key(&tx.merchant_wallet, tx.created_at, &tx.tx_hash);
            index.insert(key.as_slice(), tx.status.as_str())?;

            if tx.status.is_terminal() {
                let mut in_flight = write_txn.open_table(IN_FLIGHT_TXS)?;
                in_flight.remove(tx_hash)?;
            }
            tx
        };
        write_txn.commit()?;
        Ok(tx)
    }

    /// Newest-first page of a merchant's payments.
    ///
    /// Returns `(transactions, next_cursor)`; the cursor is `None` on the
    /// last page. An undecodable cursor restarts from the newest entry.
    pub fn list_by_merchant(
        &self,
        wallet: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> DbResult<(Vec<MerchantTransaction>, Option<String>)> {
        let limit = limit.max(1);
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(MERCHANT_TX_INDEX)?;
        let table = read_txn.open_table(TRANSACTIONS)?;

        let prefix = make_prefix(wallet);
        let prefix_end = make_prefix_end(wallet);

        let (start, skip_first) = match cursor.and_then(decode_cursor) {
            Some(key) if key.starts_with(&prefix) => (key, true),
            _ => (prefix.clone(), false),
        };

        let mut results = Vec::with_capacity(limit);
        let mut last_key: Option<Vec<u8>> = None;
        let mut has_more = false;
        let mut skip = skip_first;

        for entry in index.range(start.as_slice()..prefix_end.as_slice())? {
            let (key, _) = entry?;
            let key_bytes = key.value();
            if skip {
                skip = false;
                if key_bytes == start.as_slice() {
                    continue;
                }
            }
            if results.len() == limit {
                has_more = true;
                break;
            }
            let Some(tx_hash) = tx_hash_from_key(key_bytes, prefix.len()) else {
                continue;
            };
            if let Some(value) = table.get(tx_hash)? {
                results.push(serde_json::from_slice::<MerchantTransaction>(value.value())?);
                last_key = Some(key_bytes.to_vec());
            }
        }

        let next_cursor = if has_more {
            last_key.map(|k| encode_cursor(&k))
        } else {
            None
        };
        Ok((results, next_cursor))
    }

    /// Payments still in flight (`PENDING` or `PROCESSING`), oldest first.
    pub fn list_in_flight(&self) -> DbResult<Vec<MerchantTransaction>> {
        let read_txn = self.db.begin_read()?;
        let in_flight = read_txn.open_table(IN_FLIGHT_TXS)?;
        let table = read_txn.open_table(TRANSACTIONS)?;
        let mut out = Vec::new();
        for entry in in_flight.iter()? {
            let (hash, _) = entry?;
            let Some(value) = table.get(hash.value())? else {
                continue;
            };
            let tx: MerchantTransaction = serde_json::from_slice(value.value())?;
            if !tx.status.is_terminal() {
                out.push(tx);
            }
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    /// Aggregate a merchant's payment history.
    pub fn stats(&self, wallet: &str) -> DbResult<MerchantStats> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(MERCHANT_TX_INDEX)?;
        let table = read_txn.open_table(TRANSACTIONS)?;

        let prefix = make_prefix(wallet);
        let prefix_end = make_prefix_end(wallet);

        let mut stats = MerchantStats::default();
        let mut timed = 0u64;
        let mut time_sum = 0u64;

        for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (key, _) = entry?;
            let Some(tx_hash) = tx_hash_from_key(key.value(), prefix.len()) else {
                continue;
            };
            let Some(value) = table.get(tx_hash)? else {
                continue;
            };
            let tx: MerchantTransaction = serde_json::from_slice(value.value())?;

            stats.total_transactions += 1;
            match tx.status {
                TxStatus::Completed => {
                    stats.completed += 1;
                    stats.total_volume_usd += tx.usd_value;
                    if let Some(secs) = tx.bridge_time_secs {
                        timed += 1;
                        time_sum += secs;
                    }
                }
                TxStatus::Pending | TxStatus::Processing => stats.pending += 1,
                TxStatus::Failed | TxStatus::Cancelled => stats.failed += 1,
            }
        }

        if timed > 0 {
            stats.average_bridge_time_secs = Some(time_sum as f64 / timed as f64);
        }
        Ok(stats)
    }
}
