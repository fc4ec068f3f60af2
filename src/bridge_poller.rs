// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! # Bridge Completion Poller
//!
//! Background task that follows in-flight payments until the bridge reports
//! an outcome, so status moves server-side even when the payer closed the
//! payment page.
//!
//! ## Strategy
//!
//! Every `poll_interval` (default 5 s) the poller:
//! 1. Lists payments in `PENDING` or `PROCESSING`.
//! 2. Asks the routing vendor for each payment's bridge status.
//! 3. Maps `DONE → COMPLETED`, `FAILED → FAILED`, `PENDING → PROCESSING`.
//!
//! A payment is polled at most `max_attempts` times (default 60). After that
//! it is left unchanged and skipped until the process restarts.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_BRIDGE_POLL_INTERVAL_SECS, DEFAULT_BRIDGE_POLL_MAX_ATTEMPTS};
use crate::providers::{BridgeState, RouteSource, StatusQuery};
use crate::storage::{
    with_retry, DbError, GatewayDatabase, MerchantTransaction, RetryPolicy, TransactionRepository,
    TxStatus,
};

/// Outcome counts of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub polled: usize,
    pub updated: usize,
    pub given_up: usize,
}

/// Background poller that settles in-flight payments.
pub struct BridgePoller {
    db: Arc<GatewayDatabase>,
    routes: Arc<dyn RouteSource>,
    poll_interval: Duration,
    max_attempts: u32,
    retry: RetryPolicy,
    attempts: HashMap<String, u32>,
    abandoned: HashSet<String>,
}

impl BridgePoller {
    pub fn new(db: Arc<GatewayDatabase>, routes: Arc<dyn RouteSource>) -> Self {
        Self {
            db,
            routes,
            poll_interval: Duration::from_secs(DEFAULT_BRIDGE_POLL_INTERVAL_SECS),
            max_attempts: DEFAULT_BRIDGE_POLL_MAX_ATTEMPTS,
            retry: RetryPolicy::DEFAULT,
            attempts: HashMap::new(),
            abandoned: HashSet::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the poller loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(poller.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            max_attempts = self.max_attempts,
            "Bridge poller starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Bridge poller shutting down");
                return;
            }

            self.poll_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Bridge poller shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep over in-flight payments.
    pub async fn poll_step(&mut self) -> SweepSummary {
        let mut summary = SweepSummary::default();

        let in_flight = match TransactionRepository::new(&self.db).list_in_flight() {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Bridge poller: failed to list in-flight payments");
                return summary;
            }
        };

        let live: HashSet<&str> = in_flight.iter().map(|tx| tx.tx_hash.as_str()).collect();
        self.attempts.retain(|hash, _| live.contains(hash.as_str()));
        self.abandoned.retain(|hash| live.contains(hash.as_str()));

        for tx in &in_flight {
            if self.abandoned.contains(&tx.tx_hash) {
                continue;
            }
            let attempts = self.attempts.entry(tx.tx_hash.clone()).or_insert(0);
            if *attempts >= self.max_attempts {
                warn!(
                    tx_hash = %tx.tx_hash,
                    attempts = *attempts,
                    status = %tx.status,
                    "Bridge poller: giving up on payment"
                );
                self.abandoned.insert(tx.tx_hash.clone());
                summary.given_up += 1;
                continue;
            }
            *attempts += 1;
            summary.polled += 1;

            if self.poll_one(tx).await {
                summary.updated += 1;
            }
        }

        if summary.updated > 0 || summary.given_up > 0 {
            info!(
                polled = summary.polled,
                updated = summary.updated,
                given_up = summary.given_up,
                "Bridge poller: sweep complete"
            );
        }
        summary
    }

    async fn poll_one(&self, tx: &MerchantTransaction) -> bool {
        let query = status_query(tx);
        let status = match self.routes.status(&query).await {
            Ok(status) => status,
            Err(e) => {
                warn!(tx_hash = %tx.tx_hash, error = %e, "Bridge poller: status lookup failed");
                return false;
            }
        };

        let Some(next) = next_status(tx.status, status.status) else {
            debug!(tx_hash = %tx.tx_hash, state = ?status.status, "Bridge poller: no change");
            return false;
        };

        let repo = TransactionRepository::new(&self.db);
        match with_retry(self.retry, || repo.update_status(&tx.tx_hash, next, None)).await {
            Ok(updated) => {
                info!(
                    tx_hash = %updated.tx_hash,
                    status = %updated.status,
                    bridge_time_secs = ?updated.bridge_time_secs,
                    "Bridge poller: payment updated"
                );
                true
            }
            // Someone else finished it between list and update.
            Err(DbError::InvalidTransition(_)) => false,
            Err(e) => {
                warn!(tx_hash = %tx.tx_hash, error = %e, "Bridge poller: failed to persist status");
                false
            }
        }
    }
}

fn status_query(tx: &MerchantTransaction) -> StatusQuery {
    StatusQuery {
        tx_hash: tx.tx_hash.clone(),
        bridge: (!tx.protocol.is_empty()).then(|| tx.protocol.clone()),
        from_chain: tx.source_chain.parse().ok(),
        to_chain: tx.destination_chain.parse().ok(),
    }
}

/// Status a payment should move to, if any.
fn next_status(current: TxStatus, reported: BridgeState) -> Option<TxStatus> {
    match reported {
        BridgeState::Done => Some(TxStatus::Completed),
        BridgeState::Failed => Some(TxStatus::Failed),
        BridgeState::Pending if current == TxStatus::Pending => Some(TxStatus::Processing),
        BridgeState::Pending | BridgeState::NotFound | BridgeState::Invalid => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{BridgeStatus, ProviderError, RouteRequest};
    use crate::storage::database::tests::temp_db;
    use crate::storage::NewTransaction;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    struct FakeRoutes {
        states: Mutex<HashMap<String, BridgeState>>,
        queries: Mutex<Vec<StatusQuery>>,
    }

    impl FakeRoutes {
        fn new(states: &[(&str, BridgeState)]) -> Self {
            Self {
                states: Mutex::new(states.iter().map(|(h, s)| (h.to_string(), *s)).collect()),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn set(&self, hash: &str, state: BridgeState) {
            self.states.lock().unwrap().insert(hash.to_string(), state);
        }
    }

    #[async_trait]
    impl RouteSource for FakeRoutes {
        async fn routes(&self, _request: &RouteRequest) -> Result<Vec<Value>, ProviderError> {
            Ok(Vec::new())
        }

        async fn step_transaction(&self, step: &Value) -> Result<Value, ProviderError> {
            Ok(step.clone())
        }

        async fn status(&self, query: &StatusQuery) -> Result<BridgeStatus, ProviderError> {
            self.queries.lock().unwrap().push(query.clone());
            let state = self.states.lock().unwrap().get(&query.tx_hash).copied();
            match state {
                Some(status) => Ok(BridgeStatus {
                    status,
                    substatus: None,
                    substatus_message: None,
                    receiving_tx_hash: None,
                    tool: None,
                }),
                None => Err(ProviderError::NotFound(query.tx_hash.clone())),
            }
        }
    }

    fn record(db: &GatewayDatabase, hash: &str) {
        let tx = MerchantTransaction::new_pending(NewTransaction {
            tx_hash: hash.to_string(),
            merchant_wallet: "0xmerchant".to_string(),
            source_chain: "42161".to_string(),
            destination_chain: "8453".to_string(),
            source_token: Some("USDC".to_string()),
            amount: "10".to_string(),
            usd_value: 10.0,
            protocol: "cctp".to_string(),
            estimated_time_secs: Some(15),
        });
        TransactionRepository::new(db).create(&tx).unwrap();
    }

    fn poller(db: GatewayDatabase, routes: Arc<FakeRoutes>, max_attempts: u32) -> BridgePoller {
        BridgePoller::new(Arc::new(db), routes)
            .with_max_attempts(max_attempts)
            .with_retry_policy(RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::ZERO,
            })
    }

    #[test]
    fn status_mapping() {
        assert_eq!(next_status(TxStatus::Pending, BridgeState::Done), Some(TxStatus::Completed));
        assert_eq!(next_status(TxStatus::Processing, BridgeState::Failed), Some(TxStatus::Failed));
        assert_eq!(
            next_status(TxStatus::Pending, BridgeState::Pending),
            Some(TxStatus::Processing)
        );
        assert_eq!(next_status(TxStatus::Processing, BridgeState::Pending), None);
        assert_eq!(next_status(TxStatus::Pending, BridgeState::NotFound), None);
    }

    #[tokio::test]
    async fn sweep_applies_bridge_outcomes() {
        let (db, _dir) = temp_db();
        record(&db, "0xdone");
        record(&db, "0xfailed");
        record(&db, "0xmoving");
        let routes = Arc::new(FakeRoutes::new(&[
            ("0xdone", BridgeState::Done),
            ("0xfailed", BridgeState::Failed),
            ("0xmoving", BridgeState::Pending),
        ]));
        let mut poller = poller(db, routes.clone(), 60);

        let summary = poller.poll_step().await;
        assert_eq!(summary.polled, 3);
        assert_eq!(summary.updated, 3);

        let repo = TransactionRepository::new(&poller.db);
        let done = repo.get("0xdone").unwrap().unwrap();
        assert_eq!(done.status, TxStatus::Completed);
        assert!(done.bridge_time_secs.is_some());
        assert_eq!(repo.get("0xfailed").unwrap().unwrap().status, TxStatus::Failed);
        assert_eq!(repo.get("0xmoving").unwrap().unwrap().status, TxStatus::Processing);

        let queries = routes.queries.lock().unwrap();
        assert_eq!(queries[0].bridge.as_deref(), Some("cctp"));
        assert_eq!(queries[0].from_chain, Some(42161));
        assert_eq!(queries[0].to_chain, Some(8453));
    }

    #[tokio::test]
    async fn terminal_payments_are_not_polled_again() {
        let (db, _dir) = temp_db();
        record(&db, "0xdone");
        let routes = Arc::new(FakeRoutes::new(&[("0xdone", BridgeState::Done)]));
        let mut poller = poller(db, routes.clone(), 60);

        poller.poll_step().await;
        let summary = poller.poll_step().await;
        assert_eq!(summary.polled, 0);
        assert_eq!(routes.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (db, _dir) = temp_db();
        record(&db, "0xstuck");
        let routes = Arc::new(FakeRoutes::new(&[("0xstuck", BridgeState::NotFound)]));
        let mut poller = poller(db, routes.clone(), 2);

        assert_eq!(poller.poll_step().await.polled, 1);
        assert_eq!(poller.poll_step().await.polled, 1);
        let summary = poller.poll_step().await;
        assert_eq!(summary, SweepSummary { polled: 0, updated: 0, given_up: 1 });

        // Abandoned payments stay untouched even if the bridge later finishes.
        routes.set("0xstuck", BridgeState::Done);
        let summary = poller.poll_step().await;
        assert_eq!(summary, SweepSummary::default());
        assert_eq!(routes.queries.lock().unwrap().len(), 2);

        let tx = TransactionRepository::new(&poller.db).get("0xstuck").unwrap().unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn vendor_errors_leave_payment_pending() {
        let (db, _dir) = temp_db();
        record(&db, "0xunknown");
        let routes = Arc::new(FakeRoutes::new(&[]));
        let mut poller = poller(db, routes, 60);

        let summary = poller.poll_step().await;
        assert_eq!(summary.polled, 1);
        assert_eq!(summary.updated, 0);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (db, _dir) = temp_db();
        let routes = Arc::new(FakeRoutes::new(&[]));
        let poller = poller(db, routes, 60).with_interval(Duration::from_secs(3600));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(poller.run(shutdown.clone()));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
