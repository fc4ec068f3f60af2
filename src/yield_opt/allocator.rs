// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

//! Balance-gated yield allocation.
//!
//! A merchant balance at or above [`MIN_YIELD_BALANCE`] may be split across
//! a static list of lending protocols. The split depends only on the
//! merchant's [`RiskTolerance`]:
//!
//! | Tolerance | Split |
//! |---|---|
//! | conservative | 100% to the lowest-risk protocol |
//! | moderate | 60% / 40% across the two lowest-risk protocols |
//! | aggressive | equal shares across every protocol |

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::YieldError;

/// Minimum balance (USDC) before yield allocation is offered.
pub const MIN_YIELD_BALANCE: f64 = 200.0;

/// Share of the balance sent to the lowest-risk protocol under `moderate`.
const MODERATE_PRIMARY_SHARE: f64 = 0.6;

/// Merchant-selected risk appetite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl std::fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTolerance::Conservative => write!(f, "conservative"),
            RiskTolerance::Moderate => write!(f, "moderate"),
            RiskTolerance::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// A lending protocol that can receive an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YieldProtocol {
    /// Display name
    pub name: &'static str,
    /// Advertised APY in percent
    pub apy: f64,
    /// 1 = lowest risk
    pub risk_rank: u8,
}

/// Protocols offered to merchants, lowest risk first.
pub const YIELD_PROTOCOLS: &[YieldProtocol] = &[
    YieldProtocol {
        name: "Aave V3",
        apy: 4.2,
        risk_rank: 1,
    },
    YieldProtocol {
        name: "Compound V3",
        apy: 5.1,
        risk_rank: 2,
    },
    YieldProtocol {
        name: "Yearn Finance",
        apy: 7.8,
        risk_rank: 3,
    },
];

/// Amount routed to one protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Allocation {
    pub protocol: String,
    pub amount: f64,
    pub apy: f64,
}

/// A complete split of a balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AllocationPlan {
    pub total: f64,
    pub risk_tolerance: RiskTolerance,
    pub allocations: Vec<Allocation>,
    /// `Σ amount·apy / Σ amount`
    pub weighted_apy: f64,
}

/// Eligibility verdict for a balance.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Eligibility {
    pub eligible: bool,
    pub balance: f64,
    pub minimum: f64,
    /// How much more is needed to become eligible (0 when eligible)
    pub shortfall: f64,
}

/// Check whether a balance may be allocated. The threshold itself is eligible.
pub fn check_eligibility(balance: f64, minimum: f64) -> Eligibility {
    let eligible = balance.is_finite() && balance >= minimum;
    Eligibility {
        eligible,
        balance,
        minimum,
        shortfall: if eligible { 0.0 } else { (minimum - balance).max(0.0) },
    }
}

/// Split `amount` across `protocols` according to `risk`.
///
/// `protocols` is ranked by `risk_rank` before splitting, so callers may pass
/// it in any order.
pub fn allocate(
    amount: f64,
    risk: RiskTolerance,
    protocols: &[YieldProtocol],
) -> Result<AllocationPlan, YieldError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(YieldError::InvalidAmount(amount));
    }

    let mut ranked: Vec<&YieldProtocol> = protocols.iter().collect();
    ranked.sort_by_key(|p| p.risk_rank);

    let required = match risk {
        RiskTolerance::Conservative => 1,
        RiskTolerance::Moderate => 2,
        RiskTolerance::Aggressive => 1,
    };
    if ranked.len() < required {
        return Err(YieldError::NotEnoughProtocols {
            required,
            available: ranked.len(),
        });
    }

    let allocations = match risk {
        RiskTolerance::Conservative => vec![entry(ranked[0], amount)],
        RiskTolerance::Moderate => {
            let primary = amount * MODERATE_PRIMARY_SHARE;
            vec![entry(ranked[0], primary), entry(ranked[1], amount - primary)]
        }
        RiskTolerance::Aggressive => {
            let count = ranked.len();
            let share = amount / count as f64;
            let mut out: Vec<Allocation> = ranked.iter().map(|p| entry(p, share)).collect();
            // Last share absorbs rounding so the parts add up to the input.
            let assigned: f64 = share * (count - 1) as f64;
            if let Some(last) = out.last_mut() {
                last.amount = amount - assigned;
            }
            out
        }
    };

    let weighted_apy = weighted_apy(&allocations);
    Ok(AllocationPlan {
        total: amount,
        risk_tolerance: risk,
        allocations,
        weighted_apy,
    })
}

fn entry(protocol: &YieldProtocol, amount: f64) -> Allocation {
    Allocation {
        protocol: protocol.name.to_string(),
        amount,
        apy: protocol.apy,
    }
}

fn weighted_apy(allocations: &[Allocation]) -> f64 {
    let total: f64 = allocations.iter().map(|a| a.amount).sum();
    if total <= 0.0 {
        return 0.0;
    }
    allocations.iter().map(|a| a.amount * a.apy).sum::<f64>() / total
}
