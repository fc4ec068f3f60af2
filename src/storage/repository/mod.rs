// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Repository layer providing typed access to the gateway database.
//!
//! Each repository borrows the [`GatewayDatabase`](super::GatewayDatabase)
//! and owns the records of one entity type.

pub mod profiles;
pub mod sessions;
pub mod transactions;

pub use profiles::{MerchantProfile, NewProfile, ProfileRepository, ProfileUpdate};
pub use sessions::{MerchantSession, SessionRepository};
pub use transactions::{
    MerchantStats, MerchantTransaction, NewTransaction, TransactionRepository, TxStatus,
};
