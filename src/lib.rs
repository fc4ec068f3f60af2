// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Hati Gateway - Merchant Cross-Chain Payment Gateway
//!
//! Merchants sign in with a wallet signature and receive stablecoin payments
//! from any supported chain, bridged to USDC on the settlement chain.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Wallet-signature sign-in and bearer sessions
//! - `blockchain` - Settlement chain reads (USDC balances)
//! - `bridge_poller` - Background completion tracking for bridged payments
//! - `providers` - Circle, LiFi and Moralis clients
//! - `routing` - Route validation and preference ordering
//! - `storage` - Embedded redb store
//! - `yield_opt` - Simulated yield allocation

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod bridge_poller;
pub mod config;
pub mod error;
pub mod providers;
pub mod routing;
pub mod state;
pub mod storage;
pub mod yield_opt;
