// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Read-only ERC-20 calls.

use std::str::FromStr;

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};

use super::client::SettlementClientError;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
    }
}

/// ERC-20 contract wrapper.
pub struct Erc20Contract<P> {
    contract: IERC20::IERC20Instance<P>,
}

impl<P: Provider + Clone> Erc20Contract<P> {
    pub fn new(provider: &P, contract_address: &str) -> Result<Self, SettlementClientError> {
        let address = Address::from_str(contract_address)
            .map_err(|e| SettlementClientError::InvalidAddress(e.to_string()))?;
        Ok(Self {
            contract: IERC20::new(address, provider.clone()),
        })
    }

    pub async fn symbol(&self) -> Result<String, SettlementClientError> {
        self.contract
            .symbol()
            .call()
            .await
            .map_err(|e| SettlementClientError::ContractError(e.to_string()))
    }

    pub async fn decimals(&self) -> Result<u8, SettlementClientError> {
        self.contract
            .decimals()
            .call()
            .await
            .map_err(|e| SettlementClientError::ContractError(e.to_string()))
    }

    /// Raw balance in the token's smallest unit.
    pub async fn balance_of(&self, wallet_address: &str) -> Result<U256, SettlementClientError> {
        let addr = Address::from_str(wallet_address)
            .map_err(|e| SettlementClientError::InvalidAddress(e.to_string()))?;
        self.contract
            .balanceOf(addr)
            .call()
            .await
            .map_err(|e| SettlementClientError::ContractError(e.to_string()))
    }
}
