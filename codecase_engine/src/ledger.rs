/// CodeCase Engine — Points Ledger
///
/// Pure half of the unlock flow: cost derivation and spend planning.
/// Executing a plan against the profile store is the runtime's job; nothing
/// here mutates a ledger in place.
///
/// Invariants:
///   - point_balance never goes below zero through a spend
///   - unlocked_ids only grows

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::arithmetic::checked_scale;
use crate::domain::{Case, Difficulty};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("cost must be non-negative, got {0}")]
    NegativeCost(i64),
    #[error("base points must be non-negative, got {0}")]
    NegativeBase(i64),
    #[error("content id must not be empty")]
    EmptyContentId,
    #[error("point arithmetic overflowed")]
    Overflow,
}

/// Spendable balance plus the set of unlocked content ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub point_balance: i64,
    #[serde(default)]
    pub unlocked_ids: BTreeSet<String>,
}

impl LedgerState {
    pub fn new(point_balance: i64) -> Self {
        Self {
            point_balance,
            unlocked_ids: BTreeSet::new(),
        }
    }

    pub fn can_afford(&self, cost: i64) -> bool {
        cost >= 0 && self.point_balance >= cost
    }

    pub fn is_unlocked(&self, content_id: &str) -> bool {
        self.unlocked_ids.contains(content_id)
    }
}

/// What a spend would do, decided without touching any store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendPlan {
    AlreadyUnlocked,
    InsufficientFunds { balance: i64, cost: i64 },
    Debit { next: LedgerState },
}

/// Decide the outcome of spending `cost` to unlock `content_id`.
/// The already-unlocked check runs before the balance check so retries are
/// idempotent.
pub fn plan_spend(
    ledger: &LedgerState,
    content_id: &str,
    cost: i64,
) -> Result<SpendPlan, LedgerError> {
    if content_id.is_empty() {
        return Err(LedgerError::EmptyContentId);
    }
    if cost < 0 {
        return Err(LedgerError::NegativeCost(cost));
    }
    if ledger.is_unlocked(content_id) {
        return Ok(SpendPlan::AlreadyUnlocked);
    }
    if ledger.point_balance < cost {
        return Ok(SpendPlan::InsufficientFunds {
            balance: ledger.point_balance,
            cost,
        });
    }

    let point_balance = ledger
        .point_balance
        .checked_sub(cost)
        .ok_or(LedgerError::Overflow)?;
    let mut unlocked_ids = ledger.unlocked_ids.clone();
    unlocked_ids.insert(content_id.to_string());

    Ok(SpendPlan::Debit {
        next: LedgerState {
            point_balance,
            unlocked_ids,
        },
    })
}

/// `base_points × 2 × multiplier / 2`. Existing content is priced with this
/// exact formula.
pub fn unlock_cost(base_points: i64, difficulty: Difficulty) -> Result<i64, LedgerError> {
    if base_points < 0 {
        return Err(LedgerError::NegativeBase(base_points));
    }
    let doubled = base_points.checked_mul(2).ok_or(LedgerError::Overflow)?;
    checked_scale(doubled, difficulty.multiplier(), 2).ok_or(LedgerError::Overflow)
}

pub fn case_unlock_cost(case: &Case) -> Result<i64, LedgerError> {
    unlock_cost(case.reward_points, case.difficulty)
}
