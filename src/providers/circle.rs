// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Circle developer-controlled wallets.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use super::{read_json, CustodialWallet, CustodialWallets, ProviderError, SignedTransaction, TokenBalance};
use crate::config::{CircleConfig, VENDOR_TIMEOUT};

const VENDOR: &str = "circle";

#[derive(Debug, Clone)]
pub struct CircleClient {
    base_url: String,
    api_key: String,
    entity_secret_ciphertext: String,
    wallet_set_id: String,
    blockchain: String,
    http: Client,
}

impl CircleClient {
    pub fn new(config: &CircleConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(VENDOR_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            entity_secret_ciphertext: config.entity_secret_ciphertext.clone(),
            wallet_set_id: config.wallet_set_id.clone(),
            blockchain: config.blockchain.clone(),
            http,
        })
    }

    async fn post_json(&self, path: &str, what: &str, payload: &Value) -> Result<Value, ProviderError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{VENDOR} {what}: {e}")))?;
        read_json(VENDOR, what, response).await
    }

    async fn get_json(&self, path: &str, what: &str) -> Result<Value, ProviderError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{VENDOR} {what}: {e}")))?;
        read_json(VENDOR, what, response).await
    }
}

#[async_trait]
impl CustodialWallets for CircleClient {
    async fn create_wallet(&self, idempotency_key: &str) -> Result<CustodialWallet, ProviderError> {
        let payload = json!({
            "idempotencyKey": idempotency_key,
            "entitySecretCiphertext": self.entity_secret_ciphertext,
            "walletSetId": self.wallet_set_id,
            "blockchains": [self.blockchain],
            "count": 1,
            "accountType": "EOA",
        });
        let response = self
            .post_json("/v1/w3s/developer/wallets", "create_wallet", &payload)
            .await?;
        let wallet = parse_created_wallet(&response)?;
        info!(
            wallet_id = %wallet.wallet_id,
            address = %wallet.address,
            blockchain = %wallet.blockchain,
            "Circle wallet created"
        );
        Ok(wallet)
    }

    async fn balances(&self, wallet_id: &str) -> Result<Vec<TokenBalance>, ProviderError> {
        if wallet_id.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("wallet id is required".to_string()));
        }
        let response = self
            .get_json(&format!("/v1/w3s/wallets/{wallet_id}/balances"), "balances")
            .await?;
        parse_balances(&response)
    }

    async fn sign_transaction(
        &self,
        wallet_id: &str,
        transaction: &Value,
        memo: Option<&str>,
    ) -> Result<SignedTransaction, ProviderError> {
        let mut payload = json!({
            "walletId": wallet_id,
            "entitySecretCiphertext": self.entity_secret_ciphertext,
            "transaction": transaction.to_string(),
        });
        if let Some(memo) = memo {
            payload["memo"] = Value::String(memo.to_string());
        }
        let response = self
            .post_json("/v1/w3s/developer/sign/transaction", "sign_transaction", &payload)
            .await?;
        parse_signed(&response)
    }
}

fn parse_created_wallet(response: &Value) -> Result<CustodialWallet, ProviderError> {
    let wallet = response
        .pointer("/data/wallets/0")
        .ok_or_else(|| ProviderError::InvalidResponse("no wallet in create response".to_string()))?;
    let field = |name: &str| {
        wallet
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::InvalidResponse(format!("wallet is missing `{name}`")))
    };
    Ok(CustodialWallet {
        wallet_id: field("id")?,
        address: field("address")?,
        blockchain: field("blockchain")?,
    })
}

fn parse_balances(response: &Value) -> Result<Vec<TokenBalance>, ProviderError> {
    let entries = response
        .pointer("/data/tokenBalances")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::InvalidResponse("missing data.tokenBalances".to_string()))?;

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let token = entry.get("token")?;
            let amount = entry.get("amount").and_then(Value::as_str)?;
            Some(TokenBalance {
                token_address: token
                    .get("tokenAddress")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                symbol: token
                    .get("symbol")
                    .and_then(Value::as_str)
                    .unwrap_or("UNKNOWN")
                    .to_string(),
                name: token.get("name").and_then(Value::as_str).map(str::to_string),
                decimals: token
                    .get("decimals")
                    .and_then(Value::as_u64)
                    .and_then(|d| u8::try_from(d).ok()),
                amount: amount.to_string(),
            })
        })
        .collect())
}

fn parse_signed(response: &Value) -> Result<SignedTransaction, ProviderError> {
    let data = response
        .get("data")
        .ok_or_else(|| ProviderError::InvalidResponse("missing data".to_string()))?;
    let signature = data
        .get("signature")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::InvalidResponse("missing signature".to_string()))?;
    Ok(SignedTransaction {
        signature: signature.to_string(),
        signed_transaction: data
            .get("signedTransaction")
            .and_then(Value::as_str)
            .map(str::to_string),
        tx_hash: data.get("txHash").and_then(Value::as_str).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_created_wallet() {
        let body = json!({
            "data": {
                "wallets": [{
                    "id": "ce714f5b-0d8e-4062-9454-61aa1154869b",
                    "state": "LIVE",
                    "walletSetId": "0189bc61-7fe4-70f3-8a1b-0d14426397cb",
                    "address": "0xf5c83e5fede8456929d0f90e8c541dcac3d63835",
                    "blockchain": "BASE-SEPOLIA",
                    "accountType": "EOA"
                }]
            }
        });
        let wallet = parse_created_wallet(&body).unwrap();
        assert_eq!(wallet.wallet_id, "ce714f5b-0d8e-4062-9454-61aa1154869b");
        assert_eq!(wallet.blockchain, "BASE-SEPOLIA");
    }

    #[test]
    fn empty_wallet_list_is_invalid() {
        let err = parse_created_wallet(&json!({ "data": { "wallets": [] } })).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn parses_token_balances() {
        let body = json!({
            "data": {
                "tokenBalances": [
                    {
                        "token": {
                            "id": "e4f549f9",
                            "blockchain": "BASE-SEPOLIA",
                            "name": "USD Coin",
                            "symbol": "USDC",
                            "decimals": 6,
                            "isNative": false,
                            "tokenAddress": "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
                        },
                        "amount": "250.5",
                        "updateDate": "2026-01-01T00:00:00Z"
                    },
                    {
                        "token": { "symbol": "ETH", "isNative": true, "decimals": 18 },
                        "amount": "0.01"
                    },
                    { "amount": "1" }
                ]
            }
        });
        let balances = parse_balances(&body).unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].symbol, "USDC");
        assert_eq!(balances[0].amount, "250.5");
        assert_eq!(balances[0].decimals, Some(6));
        assert_eq!(balances[1].token_address, None);
    }

    #[test]
    fn parses_signature() {
        let body = json!({ "data": { "signature": "0xabc", "signedTransaction": "0xf86c" } });
        let signed = parse_signed(&body).unwrap();
        assert_eq!(signed.signature, "0xabc");
        assert_eq!(signed.signed_transaction.as_deref(), Some("0xf86c"));
        assert!(signed.tx_hash.is_none());
        assert!(parse_signed(&json!({ "data": {} })).is_err());
    }
}
