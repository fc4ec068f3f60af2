// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Mock yield optimization for idle merchant balances.
//!
//! Allocation is real arithmetic; execution is simulated. See
//! [`executor::SimulatedExecutor`].

pub mod allocator;
pub mod executor;

use std::sync::Arc;

pub use allocator::{
    allocate, check_eligibility, Allocation, AllocationPlan, Eligibility, RiskTolerance,
    YieldProtocol, MIN_YIELD_BALANCE, YIELD_PROTOCOLS,
};
pub use executor::{
    execute_plan, DepositReceipt, SimulatedExecutor, YieldExecutionReport, YieldExecutor,
    DEFAULT_EXECUTION_DELAY,
};

/// Errors raised by yield allocation and execution.
#[derive(Debug, thiserror::Error)]
pub enum YieldError {
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("balance {balance} is below the {minimum} minimum")]
    BelowMinimum { balance: f64, minimum: f64 },

    #[error("strategy needs {required} protocols, only {available} configured")]
    NotEnoughProtocols { required: usize, available: usize },

    #[error("deposit into {protocol} failed: {message}")]
    Execution { protocol: String, message: String },
}

/// Allocation settings plus the executor that places deposits.
#[derive(Clone)]
pub struct YieldOptimizer {
    minimum_balance: f64,
    protocols: Vec<YieldProtocol>,
    executor: Arc<dyn YieldExecutor>,
}

impl YieldOptimizer {
    pub fn new(minimum_balance: f64, executor: Arc<dyn YieldExecutor>) -> Self {
        Self {
            minimum_balance,
            protocols: YIELD_PROTOCOLS.to_vec(),
            executor,
        }
    }

    pub fn minimum_balance(&self) -> f64 {
        self.minimum_balance
    }

    pub fn protocols(&self) -> &[YieldProtocol] {
        &self.protocols
    }

    pub fn eligibility(&self, balance: f64) -> Eligibility {
        check_eligibility(balance, self.minimum_balance)
    }

    /// Plan an allocation for an eligible balance.
    pub fn plan(&self, balance: f64, risk: RiskTolerance) -> Result<AllocationPlan, YieldError> {
        if !self.eligibility(balance).eligible {
            return Err(YieldError::BelowMinimum {
                balance,
                minimum: self.minimum_balance,
            });
        }
        allocate(balance, risk, &self.protocols)
    }

    /// Plan and run an allocation.
    pub async fn optimize(
        &self,
        balance: f64,
        risk: RiskTolerance,
    ) -> Result<YieldExecutionReport, YieldError> {
        let plan = self.plan(balance, risk)?;
        Ok(execute_plan(&self.executor, plan).await)
    }
}

impl Default for YieldOptimizer {
    fn default() -> Self {
        Self::new(
            MIN_YIELD_BALANCE,
            Arc::new(SimulatedExecutor::new(DEFAULT_EXECUTION_DELAY)),
        )
    }
}
