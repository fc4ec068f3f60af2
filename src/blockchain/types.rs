// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Settlement chain constants and balance formatting.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Settlement network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// Default RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
    /// Native USDC contract
    pub usdc_address: &'static str,
    /// Blockchain identifier used by Circle
    pub circle_blockchain: &'static str,
}

pub const BASE_MAINNET: NetworkConfig = NetworkConfig {
    name: "Base",
    chain_id: 8453,
    rpc_url: "https://mainnet.base.org",
    explorer_url: "https://basescan.org",
    usdc_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
    circle_blockchain: "BASE",
};

pub const BASE_SEPOLIA: NetworkConfig = NetworkConfig {
    name: "Base Sepolia",
    chain_id: 84532,
    rpc_url: "https://sepolia.base.org",
    explorer_url: "https://sepolia.basescan.org",
    usdc_address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
    circle_blockchain: "BASE-SEPOLIA",
};

/// USDC uses 6 decimals on every supported network.
pub const USDC_DECIMALS: u8 = 6;

/// Chain every payment settles on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SettlementNetwork {
    Base,
    BaseSepolia,
}

impl SettlementNetwork {
    pub fn config(self) -> &'static NetworkConfig {
        match self {
            SettlementNetwork::Base => &BASE_MAINNET,
            SettlementNetwork::BaseSepolia => &BASE_SEPOLIA,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            SettlementNetwork::Base => "base",
            SettlementNetwork::BaseSepolia => "base-sepolia",
        }
    }

    pub fn explorer_tx_url(self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.config().explorer_url)
    }
}

impl fmt::Display for SettlementNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for SettlementNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" | "base-mainnet" => Ok(SettlementNetwork::Base),
            "base-sepolia" | "base_sepolia" => Ok(SettlementNetwork::BaseSepolia),
            other => Err(format!("unsupported settlement network `{other}`")),
        }
    }
}

/// USDC holding of a settlement address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SettlementBalance {
    pub address: String,
    pub network: String,
    pub chain_id: u64,
    pub token_address: String,
    pub symbol: String,
    /// Smallest-unit amount
    pub balance_raw: String,
    /// Decimal amount, at most 6 fractional digits
    pub balance_formatted: String,
}

impl SettlementBalance {
    /// Formatted balance as a float, for thresholds and display.
    pub fn as_f64(&self) -> f64 {
        self.balance_formatted.parse().unwrap_or(0.0)
    }
}

/// Format a balance with the specified number of decimals.
///
/// Trailing zeros are dropped and at most 6 fractional digits are kept
/// (truncated, not rounded).
pub fn format_balance(balance: U256, decimals: u8) -> String {
    if balance.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = balance / divisor;
    let remainder = balance % divisor;

    if remainder.is_zero() {
        return whole.to_string();
    }
    let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
    let trimmed = decimal_str.trim_end_matches('0');
    let fraction = &trimmed[..trimmed.len().min(6)];
    if fraction.trim_end_matches('0').is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction.trim_end_matches('0'))
    }
}
