// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! # Storage Module
//!
//! Persistent state lives in a single redb file under `DATA_DIR`:
//!
//! ```text
//! {DATA_DIR}/
//!   gateway.redb    # profiles, sessions, payments
//! ```
//!
//! Repositories are synchronous; handlers wrap writes in [`with_retry`].
//! Validated sessions are additionally held in the in-process
//! [`SessionCache`].

pub mod database;
pub mod merchant_id;
pub mod repository;
pub mod retry;
pub mod session_cache;

pub use database::{DbError, DbResult, GatewayDatabase};
pub use merchant_id::{format_merchant_id, is_valid_merchant_id, random_draw};
pub use repository::{
    MerchantProfile, MerchantSession, MerchantStats, MerchantTransaction, NewProfile,
    NewTransaction, ProfileRepository, ProfileUpdate, SessionRepository, TransactionRepository,
    TxStatus,
};
pub use retry::{retry_default, with_retry, RetryPolicy};
pub use session_cache::SessionCache;

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "gateway.redb";
