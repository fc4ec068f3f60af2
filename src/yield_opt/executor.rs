// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Execution of an allocation plan.
//!
//! No funds move. [`SimulatedExecutor`] waits a fixed delay per protocol and
//! returns a random placeholder transaction id. Deposits run in plan order;
//! the first failure stops the run and the whole report is marked failed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::allocator::{Allocation, AllocationPlan};
use super::YieldError;

/// Default simulated latency of one protocol deposit.
pub const DEFAULT_EXECUTION_DELAY: Duration = Duration::from_millis(1500);

/// Places one allocation with a protocol.
#[async_trait]
pub trait YieldExecutor: Send + Sync {
    /// Deposit an allocation and return the transaction id.
    async fn deposit(&self, allocation: &Allocation) -> Result<String, YieldError>;
}

/// Executor that only pretends to deposit.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    delay: Duration,
}

impl SimulatedExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTION_DELAY)
    }
}

/// Random `0x` + 64 hex placeholder in the shape of a transaction hash.
pub fn placeholder_tx_id() -> String {
    format!(
        "0x{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

#[async_trait]
impl YieldExecutor for SimulatedExecutor {
    async fn deposit(&self, _allocation: &Allocation) -> Result<String, YieldError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(placeholder_tx_id())
    }
}

/// One completed deposit.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DepositReceipt {
    pub protocol: String,
    pub amount: f64,
    pub apy: f64,
    pub tx_id: String,
}

/// Outcome of running a plan.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct YieldExecutionReport {
    pub success: bool,
    pub plan: AllocationPlan,
    /// Deposits completed before the run finished or failed
    pub deposits: Vec<DepositReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run every allocation of `plan` in order, stopping at the first failure.
pub async fn execute_plan(
    executor: &Arc<dyn YieldExecutor>,
    plan: AllocationPlan,
) -> YieldExecutionReport {
    let mut deposits = Vec::with_capacity(plan.allocations.len());

    for allocation in &plan.allocations {
        match executor.deposit(allocation).await {
            Ok(tx_id) => {
                info!(
                    protocol = %allocation.protocol,
                    amount = allocation.amount,
                    tx_id = %tx_id,
                    "Yield allocation placed"
                );
                deposits.push(DepositReceipt {
                    protocol: allocation.protocol.clone(),
                    amount: allocation.amount,
                    apy: allocation.apy,
                    tx_id,
                });
            }
            Err(e) => {
                warn!(
                    protocol = %allocation.protocol,
                    error = %e,
                    "Yield allocation failed, aborting remaining allocations"
                );
                return YieldExecutionReport {
                    success: false,
                    plan,
                    deposits,
                    error: Some(e.to_string()),
                };
            }
        }
    }

    YieldExecutionReport {
        success: true,
        plan,
        deposits,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yield_opt::allocator::{allocate, RiskTolerance, YIELD_PROTOCOLS};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails on the protocol with the given name.
    struct FailingExecutor {
        fail_on: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl YieldExecutor for FailingExecutor {
        async fn deposit(&self, allocation: &Allocation) -> Result<String, YieldError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if allocation.protocol == self.fail_on {
                return Err(YieldError::Execution {
                    protocol: allocation.protocol.clone(),
                    message: "pool paused".to_string(),
                });
            }
            Ok(placeholder_tx_id())
        }
    }

    #[test]
    fn placeholder_looks_like_a_hash() {
        let id = placeholder_tx_id();
        assert!(id.starts_with("0x"));
        assert_eq!(id.len(), 66);
        assert!(id[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, placeholder_tx_id());
    }

    #[tokio::test]
    async fn simulated_run_deposits_every_allocation() {
        let executor: Arc<dyn YieldExecutor> = Arc::new(SimulatedExecutor::new(Duration::ZERO));
        let plan = allocate(900.0, RiskTolerance::Aggressive, YIELD_PROTOCOLS).unwrap();

        let report = execute_plan(&executor, plan).await;

        assert!(report.success);
        assert!(report.error.is_none());
        assert_eq!(report.deposits.len(), 3);
        assert_eq!(report.deposits[2].protocol, "Yearn Finance");
    }

    #[tokio::test]
    async fn failure_aborts_remaining_allocations() {
        let failing = Arc::new(FailingExecutor {
            fail_on: "Compound V3",
            calls: AtomicUsize::new(0),
        });
        let executor: Arc<dyn YieldExecutor> = failing.clone();
        let plan = allocate(900.0, RiskTolerance::Aggressive, YIELD_PROTOCOLS).unwrap();

        let report = execute_plan(&executor, plan).await;

        assert!(!report.success);
        assert_eq!(report.deposits.len(), 1);
        assert_eq!(report.deposits[0].protocol, "Aave V3");
        assert!(report.error.unwrap().contains("pool paused"));
        // Yearn was never attempted.
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
    }
}
