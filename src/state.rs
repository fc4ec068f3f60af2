// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

use std::sync::Arc;

use crate::auth::{ChallengeIssuer, TokenHasher};
use crate::blockchain::{SettlementBalances, SettlementClient, SettlementClientError, SettlementNetwork};
use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::providers::circle::CircleClient;
use crate::providers::lifi::LifiClient;
use crate::providers::moralis::MoralisClient;
use crate::providers::{CustodialWallets, ProviderError, RouteSource, TokenBalances};
use crate::routing::RoutePolicy;
use crate::storage::{GatewayDatabase, RetryPolicy, SessionCache};
use crate::yield_opt::{SimulatedExecutor, YieldOptimizer};

/// Errors raised while wiring state at startup.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("session secret is unusable: {0}")]
    Secret(String),

    #[error("vendor client: {0}")]
    Provider(#[from] ProviderError),

    #[error("settlement client: {0}")]
    Settlement(#[from] SettlementClientError),
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<GatewayDatabase>,
    pub session_cache: Arc<SessionCache>,
    pub tokens: Arc<TokenHasher>,
    pub challenges: Arc<ChallengeIssuer>,
    pub session_ttl: chrono::Duration,
    pub route_policy: Arc<RoutePolicy>,
    pub routes: Arc<dyn RouteSource>,
    /// `None` when Circle is not configured
    pub wallets: Option<Arc<dyn CustodialWallets>>,
    /// `None` when Moralis is not configured
    pub token_balances: Option<Arc<dyn TokenBalances>>,
    pub settlement: Option<Arc<dyn SettlementBalances>>,
    pub yield_optimizer: Arc<YieldOptimizer>,
    pub retry: RetryPolicy,
    pub settlement_network: SettlementNetwork,
}

impl AppState {
    /// Wire state from configuration and an open database.
    pub fn from_config(config: &GatewayConfig, db: Arc<GatewayDatabase>) -> Result<Self, StateError> {
        let secret = config.session_secret.as_bytes();
        let tokens = TokenHasher::new(secret).map_err(|e| StateError::Secret(e.to_string()))?;
        let challenges =
            ChallengeIssuer::new(secret).map_err(|e| StateError::Secret(e.to_string()))?;

        let wallets: Option<Arc<dyn CustodialWallets>> = match &config.circle {
            Some(circle) => Some(Arc::new(CircleClient::new(circle)?)),
            None => None,
        };
        let token_balances: Option<Arc<dyn TokenBalances>> = match &config.moralis {
            Some(moralis) => Some(Arc::new(MoralisClient::new(moralis)?)),
            None => None,
        };
        let settlement = SettlementClient::new(
            config.settlement_network,
            config.settlement_rpc_url.as_deref(),
        )?;

        let optimizer = YieldOptimizer::new(
            config.yield_min_balance,
            Arc::new(SimulatedExecutor::new(config.yield_execution_delay)),
        );

        Ok(Self {
            db,
            session_cache: Arc::new(SessionCache::new(
                config.session_cache_capacity,
                config.session_cache_ttl,
            )),
            tokens: Arc::new(tokens),
            challenges: Arc::new(challenges),
            session_ttl: config.session_ttl,
            route_policy: Arc::new(RoutePolicy::new(&config.fast_protocols)),
            routes: Arc::new(LifiClient::new(&config.lifi)?),
            wallets,
            token_balances,
            settlement: Some(Arc::new(settlement)),
            yield_optimizer: Arc::new(optimizer),
            retry: RetryPolicy::DEFAULT,
            settlement_network: config.settlement_network,
        })
    }

    /// The custodial wallet vendor, or 503 when it is not configured.
    pub fn wallets(&self) -> Result<&Arc<dyn CustodialWallets>, ApiError> {
        self.wallets
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured("Circle").into())
    }

    /// The token balance vendor, or 503 when it is not configured.
    pub fn token_balances(&self) -> Result<&Arc<dyn TokenBalances>, ApiError> {
        self.token_balances
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured("Moralis").into())
    }

    pub fn with_routes(mut self, routes: Arc<dyn RouteSource>) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_wallets(mut self, wallets: Arc<dyn CustodialWallets>) -> Self {
        self.wallets = Some(wallets);
        self
    }

    pub fn with_token_balances(mut self, balances: Arc<dyn TokenBalances>) -> Self {
        self.token_balances = Some(balances);
        self
    }

    pub fn with_settlement(mut self, settlement: Option<Arc<dyn SettlementBalances>>) -> Self {
        self.settlement = settlement;
        self
    }
}

/// State over a throwaway database with no vendors wired and no delays.
#[cfg(test)]
pub(crate) fn test_state() -> (AppState, tempfile::TempDir) {
    use std::time::Duration;

    let dir = tempfile::tempdir().unwrap();
    let config = GatewayConfig::from_lookup(|name| match name {
        "SESSION_SECRET" => Some("test-session-secret-0123456789abcdef".to_string()),
        "DATA_DIR" => Some(dir.path().display().to_string()),
        "YIELD_EXECUTION_DELAY_MS" => Some("0".to_string()),
        _ => None,
    })
    .unwrap();
    let db = Arc::new(GatewayDatabase::open(&config.database_path()).unwrap());
    let mut state = AppState::from_config(&config, db).unwrap().with_settlement(None);
    state.retry = RetryPolicy {
        max_attempts: 1,
        base_delay: Duration::ZERO,
    };
    (state, dir)
}
