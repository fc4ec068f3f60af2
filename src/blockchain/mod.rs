// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Settlement chain integration (Base / Base Sepolia).
//!
//! Payments are normalized to USDC on one chain. This module knows that
//! chain's constants and reads USDC balances over RPC, which the dashboard
//! uses when the custodial wallet vendor is unavailable.

pub mod client;
pub mod erc20;
pub mod types;

use async_trait::async_trait;

pub use client::{SettlementClient, SettlementClientError};
pub use types::*;

/// USDC balance source for the settlement chain.
#[async_trait]
pub trait SettlementBalances: Send + Sync {
    async fn usdc_balance(&self, address: &str) -> Result<SettlementBalance, SettlementClientError>;
}
