// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Route preference policy and settlement-time estimation.
//!
//! ## Ordering
//!
//! Routes are ordered by the key
//! `(not fast-protocol, estimated settlement secs, summed gas USD, input index)`:
//!
//! 1. routes whose protocol is on the fast-settlement allow-list come first;
//! 2. then lower estimated settlement time;
//! 3. then lower summed first-leg gas cost;
//! 4. then original input position.
//!
//! The input index is part of the key, so the result is deterministic no
//! matter which sort the runtime provides.
//!
//! ## Estimation
//!
//! A fast-protocol route settles in a fixed, observed time
//! ([`FAST_SETTLEMENT_SECS`]). Any other route is the sum of its steps'
//! reported durations, with [`DEFAULT_STEP_SECS`] for steps that report none.
//! The estimate is display data, not a guarantee.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;

use super::route::Route;

/// Protocol identifiers treated as fast settlement when none are configured.
pub const DEFAULT_FAST_PROTOCOLS: &[&str] = &["cctp", "circle"];

/// Observed settlement time of the fast-settlement protocol, in seconds.
pub const FAST_SETTLEMENT_SECS: u64 = 15;

/// Duration assumed for a step that reports no estimate, in seconds.
pub const DEFAULT_STEP_SECS: u64 = 30;

/// Route preference configuration.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    fast_protocols: BTreeSet<String>,
    fast_settlement_secs: u64,
    default_step_secs: u64,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FAST_PROTOCOLS.iter().copied())
    }
}

impl RoutePolicy {
    /// Build a policy from an allow-list of fast-settlement identifiers.
    ///
    /// Identifiers are trimmed and lowercased; blank entries are dropped
    /// (a blank identifier would match every tool).
    pub fn new<I, S>(fast_protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fast_protocols = fast_protocols
            .into_iter()
            .map(|p| p.as_ref().trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            fast_protocols,
            fast_settlement_secs: FAST_SETTLEMENT_SECS,
            default_step_secs: DEFAULT_STEP_SECS,
        }
    }

    /// Override the fixed settlement time of fast-protocol routes.
    pub fn with_fast_settlement_secs(mut self, secs: u64) -> Self {
        self.fast_settlement_secs = secs;
        self
    }

    /// Override the duration assumed for steps without an estimate.
    pub fn with_default_step_secs(mut self, secs: u64) -> Self {
        self.default_step_secs = secs;
        self
    }

    /// Configured allow-list, lowercased.
    pub fn fast_protocols(&self) -> impl Iterator<Item = &str> {
        self.fast_protocols.iter().map(String::as_str)
    }

    /// Whether a tool name belongs to a fast-settlement protocol.
    ///
    /// Matching is case-insensitive containment of any allow-listed
    /// identifier, so `FastCircleRoute` matches `circle`.
    pub fn is_fast_protocol(&self, tool: &str) -> bool {
        let tool = tool.to_ascii_lowercase();
        self.fast_protocols.iter().any(|p| tool.contains(p.as_str()))
    }

    /// Whether a route settles through a fast-settlement protocol.
    pub fn uses_fast_protocol(&self, route: &Route) -> bool {
        self.is_fast_protocol(&route.protocol)
    }

    /// Advisory settlement time for a route, in seconds.
    pub fn estimate_settlement_secs(&self, route: &Route) -> u64 {
        if self.uses_fast_protocol(route) {
            return self.fast_settlement_secs;
        }
        route
            .steps
            .iter()
            .map(|s| s.duration_secs.unwrap_or(self.default_step_secs))
            .fold(0u64, u64::saturating_add)
    }

    /// Decorate a route with the values the ordering uses.
    pub fn rank(&self, route: Route) -> RankedRoute {
        RankedRoute {
            uses_fast_protocol: self.uses_fast_protocol(&route),
            estimated_settlement_secs: self.estimate_settlement_secs(&route),
            total_gas_cost_usd: route.total_gas_cost_usd(),
            route,
        }
    }
}

/// A route with its ordering keys attached.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RankedRoute {
    /// The vendor route
    #[serde(flatten)]
    pub route: Route,
    /// Whether the route uses a fast-settlement protocol
    pub uses_fast_protocol: bool,
    /// Advisory settlement time in seconds
    pub estimated_settlement_secs: u64,
    /// Summed first-leg gas cost in USD
    pub total_gas_cost_usd: f64,
}

fn compare(a: &(usize, RankedRoute), b: &(usize, RankedRoute)) -> Ordering {
    let (ia, ra) = a;
    let (ib, rb) = b;
    rb.uses_fast_protocol
        .cmp(&ra.uses_fast_protocol)
        .then(ra.estimated_settlement_secs.cmp(&rb.estimated_settlement_secs))
        .then(ra.total_gas_cost_usd.total_cmp(&rb.total_gas_cost_usd))
        .then(ia.cmp(ib))
}

/// Order routes by preference. The first element is the best route.
pub fn order_routes(routes: Vec<Route>, policy: &RoutePolicy) -> Vec<RankedRoute> {
    let mut decorated: Vec<(usize, RankedRoute)> = routes
        .into_iter()
        .map(|route| policy.rank(route))
        .enumerate()
        .collect();

    // Keys are unique (index is the last component), so an unstable sort
    // yields the same order as a stable one.
    decorated.sort_unstable_by(compare);

    decorated.into_iter().map(|(_, ranked)| ranked).collect()
}

/// The most preferred route, if any.
pub fn best_route(routes: Vec<Route>, policy: &RoutePolicy) -> Option<RankedRoute> {
    order_routes(routes, policy).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::RouteStep;
    use proptest::prelude::*;
    use serde_json::Value;

    fn step(tool: &str, duration: Option<u64>, gas: f64) -> RouteStep {
        RouteStep {
            id: String::new(),
            tool: tool.to_string(),
            tool_name: tool.to_string(),
            duration_secs: duration,
            gas_cost_usd: gas,
            fee_cost_usd: 0.0,
            raw: Value::Null,
        }
    }

    fn route(id: &str, protocol: &str, steps: Vec<RouteStep>) -> Route {
        Route {
            id: id.to_string(),
            protocol: protocol.to_string(),
            from_chain_id: 1,
            to_chain_id: 8453,
            from_amount: "1000000".to_string(),
            to_amount: "990000".to_string(),
            to_amount_min: None,
            from_amount_usd: None,
            to_amount_usd: None,
            tags: Vec::new(),
            steps,
        }
    }

    fn single(id: &str, protocol: &str, duration: Option<u64>, gas: f64) -> Route {
        route(id, protocol, vec![step(protocol, duration, gas)])
    }

    #[test]
    fn fast_circle_route_beats_slower_bridge() {
        let routes = vec![
            single("a", "OtherBridge", Some(40), 0.0),
            single("b", "FastCircleRoute", Some(100), 0.0),
        ];

        let ordered = order_routes(routes, &RoutePolicy::default());

        assert_eq!(ordered[0].route.protocol, "FastCircleRoute");
        assert_eq!(ordered[0].estimated_settlement_secs, 15);
        assert!(ordered[0].uses_fast_protocol);
        assert_eq!(ordered[1].route.protocol, "OtherBridge");
        assert_eq!(ordered[1].estimated_settlement_secs, 40);
    }

    #[test]
    fn classification_is_case_insensitive_substring() {
        let policy = RoutePolicy::default();
        assert!(policy.is_fast_protocol("CCTP"));
        assert!(policy.is_fast_protocol("circle-cctp-v2"));
        assert!(policy.is_fast_protocol("FastCircleRoute"));
        assert!(!policy.is_fast_protocol("stargate"));
    }

    #[test]
    fn allow_list_is_configuration() {
        let policy = RoutePolicy::new(["Stargate", "  ", ""]);
        assert_eq!(policy.fast_protocols().collect::<Vec<_>>(), vec!["stargate"]);
        assert!(policy.is_fast_protocol("stargateV2"));
        assert!(!policy.is_fast_protocol("cctp"));

        let none = RoutePolicy::new(Vec::<String>::new());
        assert!(!none.is_fast_protocol("anything"));
    }

    #[test]
    fn fast_estimate_ignores_steps() {
        let policy = RoutePolicy::default();
        let r = route(
            "r",
            "cctp",
            vec![step("cctp", Some(900), 1.0), step("uniswap", None, 1.0)],
        );
        assert_eq!(policy.estimate_settlement_secs(&r), FAST_SETTLEMENT_SECS);
    }

    #[test]
    fn slow_estimate_sums_steps_with_default() {
        let policy = RoutePolicy::default();
        let r = route(
            "r",
            "hop",
            vec![step("hop", Some(120), 0.0), step("uniswap", None, 0.0)],
        );
        assert_eq!(policy.estimate_settlement_secs(&r), 120 + DEFAULT_STEP_SECS);
    }

    #[test]
    fn custom_constants_are_used() {
        let policy = RoutePolicy::default()
            .with_fast_settlement_secs(20)
            .with_default_step_secs(60);
        assert_eq!(policy.estimate_settlement_secs(&single("a", "cctp", None, 0.0)), 20);
        assert_eq!(policy.estimate_settlement_secs(&single("b", "hop", None, 0.0)), 60);
    }

    #[test]
    fn gas_breaks_time_ties() {
        let routes = vec![
            single("expensive", "hop", Some(60), 3.0),
            single("cheap", "across", Some(60), 1.0),
        ];
        let ordered = order_routes(routes, &RoutePolicy::default());
        assert_eq!(ordered[0].route.id, "cheap");
        assert_eq!(ordered[1].route.id, "expensive");
    }

    #[test]
    fn full_ties_keep_input_order() {
        let routes = vec![
            single("first", "hop", Some(60), 1.0),
            single("second", "across", Some(60), 1.0),
            single("third", "stargate", Some(60), 1.0),
        ];
        let ids: Vec<_> = order_routes(routes, &RoutePolicy::default())
            .into_iter()
            .map(|r| r.route.id)
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn best_route_of_empty_list_is_none() {
        assert!(best_route(Vec::new(), &RoutePolicy::default()).is_none());
    }

    fn arb_route() -> impl Strategy<Value = Route> {
        let tools = prop::sample::select(vec!["cctp", "CircleFast", "hop", "across", "stargate"]);
        let steps = prop::collection::vec(
            (prop::option::of(0u64..600), prop::sample::select(vec![0.0, 0.5, 1.0, 2.5])),
            1..4,
        );
        (tools, steps).prop_map(|(tool, steps)| {
            let steps = steps
                .into_iter()
                .map(|(duration, gas)| step(tool, duration, gas))
                .collect();
            route("r", tool, steps)
        })
    }

    proptest! {
        #[test]
        fn ordering_invariants_hold(routes in prop::collection::vec(arb_route(), 0..12)) {
            let policy = RoutePolicy::default();
            let tagged: Vec<Route> = routes
                .into_iter()
                .enumerate()
                .map(|(i, mut r)| { r.id = i.to_string(); r })
                .collect();
            let ordered = order_routes(tagged.clone(), &policy);

            prop_assert_eq!(ordered.len(), tagged.len());

            // Fast-protocol routes form a prefix.
            let first_slow = ordered.iter().position(|r| !r.uses_fast_protocol).unwrap_or(ordered.len());
            prop_assert!(ordered[first_slow..].iter().all(|r| !r.uses_fast_protocol));

            for pair in ordered.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if a.uses_fast_protocol == b.uses_fast_protocol {
                    prop_assert!(a.estimated_settlement_secs <= b.estimated_settlement_secs);
                    if a.estimated_settlement_secs == b.estimated_settlement_secs {
                        prop_assert!(a.total_gas_cost_usd <= b.total_gas_cost_usd);
                        if a.total_gas_cost_usd == b.total_gas_cost_usd {
                            let ia: usize = a.route.id.parse().unwrap();
                            let ib: usize = b.route.id.parse().unwrap();
                            prop_assert!(ia < ib);
                        }
                    }
                }
                if a.uses_fast_protocol {
                    prop_assert_eq!(a.estimated_settlement_secs, FAST_SETTLEMENT_SECS);
                }
            }
        }

        #[test]
        fn slow_estimate_matches_step_sum(route in arb_route()) {
            let policy = RoutePolicy::default();
            if !policy.uses_fast_protocol(&route) {
                let expected: u64 = route
                    .steps
                    .iter()
                    .map(|s| s.duration_secs.unwrap_or(DEFAULT_STEP_SECS))
                    .sum();
                prop_assert_eq!(policy.estimate_settlement_secs(&route), expected);
            } else {
                prop_assert_eq!(policy.estimate_settlement_secs(&route), FAST_SETTLEMENT_SECS);
            }
        }
    }
}
