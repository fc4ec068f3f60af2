// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! LiFi bridging API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::debug;

use super::{read_json, BridgeState, BridgeStatus, ProviderError, RouteRequest, RouteSource, StatusQuery};
use crate::config::{LifiConfig, VENDOR_TIMEOUT};

const VENDOR: &str = "lifi";
const API_KEY_HEADER: &str = "x-lifi-api-key";

#[derive(Debug, Clone)]
pub struct LifiClient {
    base_url: String,
    api_key: Option<String>,
    integrator: String,
    http: Client,
}

impl LifiClient {
    pub fn new(config: &LifiConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(VENDOR_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            integrator: config.integrator.clone(),
            http,
        })
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Value, ProviderError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{VENDOR} {what}: {e}")))?;
        read_json(VENDOR, what, response).await
    }

    fn routes_payload(&self, request: &RouteRequest) -> Value {
        let mut options = json!({ "integrator": self.integrator });
        if let Some(slippage) = request.slippage {
            options["slippage"] = json!(slippage);
        }
        let mut payload = json!({
            "fromChainId": request.from_chain_id,
            "toChainId": request.to_chain_id,
            "fromTokenAddress": request.from_token_address,
            "toTokenAddress": request.to_token_address,
            "fromAmount": request.from_amount,
            "toAddress": request.to_address,
            "options": options,
        });
        if let Some(from) = &request.from_address {
            payload["fromAddress"] = Value::String(from.clone());
        }
        payload
    }
}

#[async_trait]
impl RouteSource for LifiClient {
    async fn routes(&self, request: &RouteRequest) -> Result<Vec<Value>, ProviderError> {
        let payload = self.routes_payload(request);
        let builder = self
            .http
            .post(format!("{}/advanced/routes", self.base_url))
            .json(&payload);
        let response = self.send(builder, "routes").await?;
        let routes = parse_routes(response)?;
        debug!(count = routes.len(), "LiFi returned routes");
        Ok(routes)
    }

    async fn step_transaction(&self, step: &Value) -> Result<Value, ProviderError> {
        let builder = self
            .http
            .post(format!("{}/advanced/stepTransaction", self.base_url))
            .json(step);
        self.send(builder, "step_transaction").await
    }

    async fn status(&self, query: &StatusQuery) -> Result<BridgeStatus, ProviderError> {
        if query.tx_hash.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("txHash is required".to_string()));
        }
        let mut params: Vec<(&str, String)> = vec![("txHash", query.tx_hash.clone())];
        if let Some(bridge) = &query.bridge {
            params.push(("bridge", bridge.clone()));
        }
        if let Some(from) = query.from_chain {
            params.push(("fromChain", from.to_string()));
        }
        if let Some(to) = query.to_chain {
            params.push(("toChain", to.to_string()));
        }
        let builder = self
            .http
            .get(format!("{}/status", self.base_url))
            .query(&params);
        let response = self.send(builder, "status").await?;
        parse_status(&response)
    }
}

fn parse_routes(response: Value) -> Result<Vec<Value>, ProviderError> {
    match response {
        Value::Object(mut map) => match map.remove("routes") {
            Some(Value::Array(routes)) => Ok(routes),
            Some(_) => Err(ProviderError::InvalidResponse("`routes` is not an array".to_string())),
            None => Err(ProviderError::InvalidResponse("missing `routes`".to_string())),
        },
        _ => Err(ProviderError::InvalidResponse("expected a JSON object".to_string())),
    }
}

fn parse_state(raw: &str) -> BridgeState {
    match raw.to_ascii_uppercase().as_str() {
        "DONE" => BridgeState::Done,
        "FAILED" => BridgeState::Failed,
        "NOT_FOUND" => BridgeState::NotFound,
        "INVALID" => BridgeState::Invalid,
        _ => BridgeState::Pending,
    }
}

fn parse_status(response: &Value) -> Result<BridgeStatus, ProviderError> {
    let status = response
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::InvalidResponse("missing status".to_string()))?;
    let text = |key: &str| response.get(key).and_then(Value::as_str).map(str::to_string);
    Ok(BridgeStatus {
        status: parse_state(status),
        substatus: text("substatus"),
        substatus_message: text("substatusMessage"),
        receiving_tx_hash: response
            .pointer("/receiving/txHash")
            .and_then(Value::as_str)
            .map(str::to_string),
        tool: text("tool"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>) -> LifiClient {
        LifiClient::new(&LifiConfig {
            base_url: "https://li.quest/v1/".to_string(),
            api_key: api_key.map(str::to_string),
            integrator: "hati".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn routes_payload_shape() {
        let request = RouteRequest {
            from_chain_id: 42161,
            to_chain_id: 8453,
            from_token_address: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831".into(),
            to_token_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".into(),
            from_amount: "1000000".into(),
            from_address: None,
            to_address: "0x1111111111111111111111111111111111111111".into(),
            slippage: Some(0.005),
        };
        let lifi = client(None);
        assert_eq!(lifi.base_url, "https://li.quest/v1");
        let payload = lifi.routes_payload(&request);
        assert_eq!(payload["fromChainId"], 42161);
        assert_eq!(payload["options"]["integrator"], "hati");
        assert_eq!(payload["options"]["slippage"], 0.005);
        assert!(payload.get("fromAddress").is_none());
    }

    #[test]
    fn routes_must_be_an_array() {
        let routes = parse_routes(json!({ "routes": [{ "id": "a" }], "unavailableRoutes": {} })).unwrap();
        assert_eq!(routes.len(), 1);
        assert!(parse_routes(json!({ "routes": {} })).is_err());
        assert!(parse_routes(json!([])).is_err());
    }

    #[test]
    fn parses_status() {
        let body = json!({
            "status": "DONE",
            "substatus": "COMPLETED",
            "substatusMessage": "The transfer is complete.",
            "tool": "cctp",
            "sending": { "txHash": "0xaaa" },
            "receiving": { "txHash": "0xbbb" }
        });
        let status = parse_status(&body).unwrap();
        assert_eq!(status.status, BridgeState::Done);
        assert_eq!(status.receiving_tx_hash.as_deref(), Some("0xbbb"));
        assert_eq!(status.tool.as_deref(), Some("cctp"));
    }

    #[test]
    fn unknown_states_are_pending() {
        assert_eq!(parse_state("PENDING"), BridgeState::Pending);
        assert_eq!(parse_state("something-new"), BridgeState::Pending);
        assert_eq!(parse_state("failed"), BridgeState::Failed);
        assert!(parse_status(&json!({})).is_err());
    }
}
