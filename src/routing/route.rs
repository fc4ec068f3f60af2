// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Bridging route records validated at the vendor boundary.
//!
//! The bridging API returns loosely shaped JSON. Everything the gateway
//! reads is pulled into [`Route`] / [`RouteStep`] here, once:
//!
//! | Vendor field | Record field | When missing |
//! |---|---|---|
//! | `id` | `Route::id` | route rejected |
//! | `steps` | `Route::steps` | route rejected (also when empty) |
//! | `steps[i].tool` (or `toolDetails.key`) | `RouteStep::tool` | route rejected |
//! | `steps[i].estimate.executionDuration` | `RouteStep::duration_secs` | `None` (policy default applies) |
//! | `steps[i].estimate.gasCosts[0].amountUSD` | `RouteStep::gas_cost_usd` | `0.0` |
//! | `steps[i].estimate.feeCosts[*].amountUSD` | `RouteStep::fee_cost_usd` | `0.0` |
//! | `fromChainId` / `toChainId` | chain ids | `0` |
//! | `fromAmount` / `toAmount` | amounts | `"0"` |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Errors raised while validating a vendor route.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("route has no steps")]
    EmptySteps,

    #[error("route JSON is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One leg of a bridging route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouteStep {
    /// Vendor step identifier (may be empty)
    pub id: String,
    /// Tool key used by this step (e.g. `cctp`, `stargate`)
    pub tool: String,
    /// Display name of the tool
    pub tool_name: String,
    /// Reported execution duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    /// First gas-cost entry of this step, in USD
    pub gas_cost_usd: f64,
    /// Sum of fee costs of this step, in USD
    pub fee_cost_usd: f64,
    /// Untouched vendor step, needed to request the step transaction
    #[serde(skip)]
    pub raw: Value,
}

/// A candidate bridging route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Route {
    /// Vendor route identifier
    pub id: String,
    /// Tool of the first step; used for protocol classification
    pub protocol: String,
    /// Source chain id
    pub from_chain_id: u64,
    /// Destination chain id
    pub to_chain_id: u64,
    /// Input amount in smallest units
    pub from_amount: String,
    /// Expected output amount in smallest units
    pub to_amount: String,
    /// Guaranteed minimum output, if reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_amount_min: Option<String>,
    /// Input value in USD, if reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_amount_usd: Option<f64>,
    /// Output value in USD, if reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_amount_usd: Option<f64>,
    /// Vendor tags such as `RECOMMENDED` or `FASTEST`
    pub tags: Vec<String>,
    /// Ordered steps
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoute {
    id: Option<String>,
    from_chain_id: Option<Value>,
    to_chain_id: Option<Value>,
    from_amount: Option<String>,
    to_amount: Option<String>,
    to_amount_min: Option<String>,
    #[serde(rename = "fromAmountUSD")]
    from_amount_usd: Option<Value>,
    #[serde(rename = "toAmountUSD")]
    to_amount_usd: Option<Value>,
    #[serde(default)]
    tags: Vec<String>,
    steps: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStep {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    tool_details: Option<RawToolDetails>,
    #[serde(default)]
    estimate: Option<RawEstimate>,
}

#[derive(Debug, Default, Deserialize)]
struct RawToolDetails {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEstimate {
    #[serde(default)]
    execution_duration: Option<Value>,
    #[serde(default)]
    gas_costs: Vec<RawCost>,
    #[serde(default)]
    fee_costs: Vec<RawCost>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCost {
    #[serde(default, rename = "amountUSD")]
    amount_usd: Option<Value>,
}

/// Read a number that the vendor may send either as JSON number or string.
fn lenient_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn lenient_u64(value: Option<&Value>) -> u64 {
    value
        .and_then(lenient_f64)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0)
}

fn cost_usd(cost: &RawCost) -> f64 {
    cost.amount_usd.as_ref().and_then(lenient_f64).unwrap_or(0.0)
}

impl RouteStep {
    /// Validate one vendor step.
    pub fn from_vendor(value: &Value) -> Result<Self, RouteError> {
        let raw: RawStep = serde_json::from_value(value.clone())?;
        let details = raw.tool_details.unwrap_or_default();

        let tool = raw
            .tool
            .filter(|t| !t.trim().is_empty())
            .or_else(|| details.key.clone().filter(|k| !k.trim().is_empty()))
            .ok_or(RouteError::MissingField("steps[].tool"))?;
        let tool_name = details.name.unwrap_or_else(|| tool.clone());

        let estimate = raw.estimate.unwrap_or_default();
        let duration_secs = estimate
            .execution_duration
            .as_ref()
            .and_then(lenient_f64)
            .filter(|d| *d >= 0.0)
            .map(|d| d.round() as u64);
        let gas_cost_usd = estimate.gas_costs.first().map(cost_usd).unwrap_or(0.0);
        let fee_cost_usd = estimate.fee_costs.iter().map(cost_usd).sum();

        Ok(Self {
            id: raw.id.unwrap_or_default(),
            tool,
            tool_name,
            duration_secs,
            gas_cost_usd,
            fee_cost_usd,
            raw: value.clone(),
        })
    }
}

impl Route {
    /// Validate one vendor route.
    pub fn from_vendor(value: &Value) -> Result<Self, RouteError> {
        let raw: RawRoute = serde_json::from_value(value.clone())?;

        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .ok_or(RouteError::MissingField("id"))?;
        let raw_steps = raw.steps.ok_or(RouteError::MissingField("steps"))?;
        if raw_steps.is_empty() {
            return Err(RouteError::EmptySteps);
        }

        let steps = raw_steps
            .iter()
            .map(RouteStep::from_vendor)
            .collect::<Result<Vec<_>, _>>()?;
        let protocol = steps[0].tool.clone();

        Ok(Self {
            id,
            protocol,
            from_chain_id: lenient_u64(raw.from_chain_id.as_ref()),
            to_chain_id: lenient_u64(raw.to_chain_id.as_ref()),
            from_amount: raw.from_amount.unwrap_or_else(|| "0".to_string()),
            to_amount: raw.to_amount.unwrap_or_else(|| "0".to_string()),
            to_amount_min: raw.to_amount_min,
            from_amount_usd: raw.from_amount_usd.as_ref().and_then(lenient_f64),
            to_amount_usd: raw.to_amount_usd.as_ref().and_then(lenient_f64),
            tags: raw.tags,
            steps,
        })
    }

    /// Validate a list of vendor routes, dropping (and logging) invalid ones.
    pub fn from_vendor_list(values: &[Value]) -> Vec<Self> {
        values
            .iter()
            .filter_map(|value| match Self::from_vendor(value) {
                Ok(route) => Some(route),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        route_id = value.get("id").and_then(serde_json::Value::as_str).unwrap_or("?"),
                        "Skipping invalid vendor route"
                    );
                    None
                }
            })
            .collect()
    }

    /// Sum of the first gas-cost entry of every step, in USD.
    pub fn total_gas_cost_usd(&self) -> f64 {
        self.steps.iter().map(|s| s.gas_cost_usd).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vendor_route() -> Value {
        json!({
            "id": "route-1",
            "fromChainId": 1,
            "toChainId": 8453,
            "fromAmount": "100000000",
            "toAmount": "99500000",
            "toAmountMin": "99000000",
            "fromAmountUSD": "100.00",
            "toAmountUSD": "99.50",
            "tags": ["RECOMMENDED"],
            "steps": [{
                "id": "step-1",
                "type": "lifi",
                "tool": "cctp",
                "toolDetails": { "key": "cctp", "name": "Circle CCTP" },
                "estimate": {
                    "executionDuration": 960,
                    "gasCosts": [
                        { "amountUSD": "1.25" },
                        { "amountUSD": "9.00" }
                    ],
                    "feeCosts": [
                        { "amountUSD": "0.10" },
                        { "amountUSD": "0.20" }
                    ]
                }
            }]
        })
    }

    #[test]
    fn parses_complete_vendor_route() {
        let route = Route::from_vendor(&vendor_route()).unwrap();
        assert_eq!(route.id, "route-1");
        assert_eq!(route.protocol, "cctp");
        assert_eq!(route.from_chain_id, 1);
        assert_eq!(route.to_chain_id, 8453);
        assert_eq!(route.to_amount_min.as_deref(), Some("99000000"));
        assert_eq!(route.from_amount_usd, Some(100.0));
        assert_eq!(route.tags, vec!["RECOMMENDED".to_string()]);

        let step = &route.steps[0];
        assert_eq!(step.tool_name, "Circle CCTP");
        assert_eq!(step.duration_secs, Some(960));
        // Only the first gas-cost entry counts.
        assert!((step.gas_cost_usd - 1.25).abs() < 1e-9);
        assert!((step.fee_cost_usd - 0.30).abs() < 1e-9);
        assert_eq!(step.raw["type"], "lifi");
    }

    #[test]
    fn missing_estimates_take_defaults() {
        let route = Route::from_vendor(&json!({
            "id": "r",
            "steps": [{ "tool": "stargate" }]
        }))
        .unwrap();

        let step = &route.steps[0];
        assert_eq!(step.duration_secs, None);
        assert_eq!(step.gas_cost_usd, 0.0);
        assert_eq!(step.fee_cost_usd, 0.0);
        assert_eq!(step.tool_name, "stargate");
        assert_eq!(route.from_amount, "0");
        assert_eq!(route.from_chain_id, 0);
    }

    #[test]
    fn numeric_fields_accept_strings_and_numbers() {
        let route = Route::from_vendor(&json!({
            "id": "r",
            "fromChainId": "137",
            "steps": [{
                "tool": "across",
                "estimate": {
                    "executionDuration": "45.4",
                    "gasCosts": [{ "amountUSD": 0.5 }]
                }
            }]
        }))
        .unwrap();

        assert_eq!(route.from_chain_id, 137);
        assert_eq!(route.steps[0].duration_secs, Some(45));
        assert_eq!(route.steps[0].gas_cost_usd, 0.5);
    }

    #[test]
    fn tool_falls_back_to_tool_details_key() {
        let route = Route::from_vendor(&json!({
            "id": "r",
            "steps": [{ "toolDetails": { "key": "hop", "name": "Hop" } }]
        }))
        .unwrap();
        assert_eq!(route.protocol, "hop");
    }

    #[test]
    fn rejects_routes_without_required_fields() {
        assert!(matches!(
            Route::from_vendor(&json!({ "steps": [{ "tool": "x" }] })),
            Err(RouteError::MissingField("id"))
        ));
        assert!(matches!(
            Route::from_vendor(&json!({ "id": "r" })),
            Err(RouteError::MissingField("steps"))
        ));
        assert!(matches!(
            Route::from_vendor(&json!({ "id": "r", "steps": [] })),
            Err(RouteError::EmptySteps)
        ));
        assert!(matches!(
            Route::from_vendor(&json!({ "id": "r", "steps": [{ "estimate": {} }] })),
            Err(RouteError::MissingField("steps[].tool"))
        ));
    }

    #[test]
    fn from_vendor_list_skips_invalid_routes() {
        let values = vec![vendor_route(), json!({ "id": "broken" })];
        let routes = Route::from_vendor_list(&values);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].id, "route-1");
    }

    #[test]
    fn total_gas_sums_steps() {
        let route = Route::from_vendor(&json!({
            "id": "r",
            "steps": [
                { "tool": "a", "estimate": { "gasCosts": [{ "amountUSD": "1.5" }] } },
                { "tool": "b", "estimate": { "gasCosts": [{ "amountUSD": "2.0" }] } },
                { "tool": "c" }
            ]
        }))
        .unwrap();
        assert!((route.total_gas_cost_usd() - 3.5).abs() < 1e-9);
    }
}
