// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Cross-chain route selection.
//!
//! Candidate routes come from the bridging API ([`crate::providers::lifi`]).
//! This module validates them into typed records and orders them by the
//! gateway's preference policy. Execution itself happens in the payer's
//! browser wallet.

pub mod policy;
pub mod route;

pub use policy::{
    best_route, order_routes, RankedRoute, RoutePolicy, DEFAULT_FAST_PROTOCOLS,
    DEFAULT_STEP_SECS, FAST_SETTLEMENT_SECS,
};
pub use route::{Route, RouteError, RouteStep};
