// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Moralis ERC-20 balances.

use std::str::FromStr;

use alloy::primitives::U256;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{read_json, ProviderError, TokenBalance, TokenBalances};
use crate::blockchain::format_balance;
use crate::config::{MoralisConfig, VENDOR_TIMEOUT};

const VENDOR: &str = "moralis";

#[derive(Debug, Clone)]
pub struct MoralisClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl MoralisClient {
    pub fn new(config: &MoralisConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(VENDOR_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http,
        })
    }
}

#[async_trait]
impl TokenBalances for MoralisClient {
    async fn erc20_balances(
        &self,
        address: &str,
        chain: &str,
    ) -> Result<Vec<TokenBalance>, ProviderError> {
        crate::auth::parse_address(address)
            .map_err(|_| ProviderError::InvalidRequest(format!("invalid address `{address}`")))?;
        if chain.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("chain is required".to_string()));
        }
        let response = self
            .http
            .get(format!("{}/api/v2.2/{address}/erc20", self.base_url))
            .header("X-API-Key", &self.api_key)
            .query(&[("chain", chain)])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{VENDOR} erc20_balances: {e}")))?;
        let body = read_json(VENDOR, "erc20_balances", response).await?;
        parse_balances(&body)
    }
}

fn parse_balances(body: &Value) -> Result<Vec<TokenBalance>, ProviderError> {
    let entries = match body {
        Value::Array(entries) => entries,
        other => other
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::InvalidResponse("expected an array of balances".to_string()))?,
    };

    Ok(entries
        .iter()
        .filter(|entry| !entry.get("possible_spam").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|entry| {
            let raw = entry.get("balance").and_then(Value::as_str)?;
            let raw = U256::from_str(raw).ok()?;
            let decimals = entry.get("decimals").and_then(|d| match d {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            });
            let decimals = decimals.and_then(|d| u8::try_from(d).ok());
            let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);
            Some(TokenBalance {
                token_address: text("token_address"),
                symbol: text("symbol").unwrap_or_else(|| "UNKNOWN".to_string()),
                name: text("name"),
                decimals,
                amount: format_balance(raw, decimals.unwrap_or(18)),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_and_formats_balances() {
        let body = json!([
            {
                "token_address": "0xaf88d065e77c8cc2239327c5edb3a432268e5831",
                "symbol": "USDC",
                "name": "USD Coin",
                "decimals": 6,
                "balance": "12500000",
                "possible_spam": false
            },
            {
                "token_address": "0xdead",
                "symbol": "FREE",
                "decimals": 18,
                "balance": "1",
                "possible_spam": true
            },
            {
                "token_address": "0xfeed",
                "symbol": "ODD",
                "decimals": "18",
                "balance": "not-a-number"
            }
        ]);
        let balances = parse_balances(&body).unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].symbol, "USDC");
        assert_eq!(balances[0].amount, "12.5");
    }

    #[test]
    fn accepts_paginated_shape() {
        let body = json!({ "result": [{ "symbol": "DAI", "decimals": "18", "balance": "2000000000000000000" }] });
        let balances = parse_balances(&body).unwrap();
        assert_eq!(balances[0].amount, "2");
        assert_eq!(balances[0].decimals, Some(18));
        assert!(parse_balances(&json!({ "oops": 1 })).is_err());
    }
}
