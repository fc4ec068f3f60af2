// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Settlement chain RPC client.

use alloy::{
    network::Ethereum,
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};
use async_trait::async_trait;

use super::erc20::Erc20Contract;
use super::types::*;
use super::SettlementBalances;

/// HTTP provider type for the settlement chain (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Read-only client for USDC on the settlement chain.
pub struct SettlementClient {
    network: SettlementNetwork,
    provider: HttpProvider,
}

impl SettlementClient {
    /// Connect to `rpc_url`, or the network's public endpoint when `None`.
    pub fn new(
        network: SettlementNetwork,
        rpc_url: Option<&str>,
    ) -> Result<Self, SettlementClientError> {
        let raw = rpc_url.unwrap_or(network.config().rpc_url);
        let url: url::Url = raw
            .parse()
            .map_err(|e: url::ParseError| SettlementClientError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self { network, provider })
    }

    pub fn network(&self) -> SettlementNetwork {
        self.network
    }

    /// USDC balance of `address`.
    pub async fn usdc_balance(
        &self,
        address: &str,
    ) -> Result<SettlementBalance, SettlementClientError> {
        let config = self.network.config();
        let contract = Erc20Contract::new(&self.provider, config.usdc_address)?;
        let raw = contract.balance_of(address).await?;

        Ok(SettlementBalance {
            address: address.to_string(),
            network: self.network.slug().to_string(),
            chain_id: config.chain_id,
            token_address: config.usdc_address.to_string(),
            symbol: "USDC".to_string(),
            balance_raw: raw.to_string(),
            balance_formatted: format_balance(raw, USDC_DECIMALS),
        })
    }

    /// Get the current block number.
    pub async fn block_number(&self) -> Result<u64, SettlementClientError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| SettlementClientError::RpcError(e.to_string()))
    }
}

#[async_trait]
impl SettlementBalances for SettlementClient {
    async fn usdc_balance(&self, address: &str) -> Result<SettlementBalance, SettlementClientError> {
        SettlementClient::usdc_balance(self, address).await
    }
}

/// Errors that can occur during settlement chain reads.
#[derive(Debug, thiserror::Error)]
pub enum SettlementClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract error: {0}")]
    ContractError(String),
}
