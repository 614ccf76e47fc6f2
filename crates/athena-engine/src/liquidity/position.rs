//! LP positions and lazy reward settlement
//!
//! A position remembers, per pool, the liquidity index and claim count at its
//! last settlement. Settling walks only the claims logged since then: rewards
//! accrue on the capital held between two claims, and each claim paid by one of
//! the position's pools shrinks that capital by its pro-rata share of the
//! payout, rounded up.

use std::collections::{BTreeMap, BTreeSet};

use athena_common::{PoolId, PositionId, Ray};
use serde::{Deserialize, Serialize};

use super::index::ClaimLog;

/// Where a position last settled in one pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub liquidity_index: Ray,
    pub claim_index: usize,
}

/// Capital deposited across one or more pools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpPosition {
    pub id: PositionId,
    pub capital: u128,
    pub pool_ids: BTreeSet<PoolId>,
    pub snapshots: BTreeMap<PoolId, PoolSnapshot>,
}

/// Outcome of settling a position up to the current pool indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSettlement {
    pub position: PositionId,
    /// Rewards earned since the last settlement, in tokens
    pub rewards: u128,
    /// Capital left once claims since the last settlement are applied
    pub capital: u128,
    /// Claims paid by the position's pools since the last settlement
    pub claims_applied: usize,
    pub snapshots: BTreeMap<PoolId, PoolSnapshot>,
}

struct PoolSettlement {
    rewards: Ray,
    capital: u128,
    claims_applied: usize,
    snapshot: PoolSnapshot,
}

impl LpPosition {
    /// Walk every pool's claim log since the snapshot
    ///
    /// `logs` and `indices` must hold an entry for each of the position's pools;
    /// a missing log is treated as empty and a missing index as unchanged.
    pub fn settle(&self, logs: &BTreeMap<PoolId, ClaimLog>, indices: &BTreeMap<PoolId, Ray>) -> RewardSettlement {
        let empty = ClaimLog::new();
        let mut rewards = Ray::ZERO;
        let mut capital = self.capital;
        let mut claims_applied = 0;
        let mut snapshots = BTreeMap::new();

        for pool in &self.pool_ids {
            let snapshot = self.snapshots.get(pool).copied().unwrap_or_default();
            let log = logs.get(pool).unwrap_or(&empty);
            let current = indices
                .get(pool)
                .copied()
                .unwrap_or(snapshot.liquidity_index);

            let settled = self.settle_pool(snapshot, log, current);
            rewards += settled.rewards;
            capital = capital.min(settled.capital);
            claims_applied = claims_applied.max(settled.claims_applied);
            snapshots.insert(*pool, settled.snapshot);
        }

        RewardSettlement {
            position: self.id,
            rewards: rewards.round(),
            capital,
            claims_applied,
            snapshots,
        }
    }

    fn settle_pool(&self, snapshot: PoolSnapshot, log: &ClaimLog, current: Ray) -> PoolSettlement {
        let mut capital = self.capital;
        let mut index = snapshot.liquidity_index;
        let mut rewards = Ray::ZERO;
        let mut claims_applied = 0;

        for entry in log.since(snapshot.claim_index) {
            if !self.pool_ids.contains(&entry.from_pool) {
                continue;
            }
            rewards += entry
                .liquidity_index_before_claim
                .saturating_sub(index)
                .mul_int(capital);
            capital -= entry.loss_on(capital);
            index = entry.liquidity_index_before_claim;
            claims_applied += 1;
        }
        rewards += current.saturating_sub(index).mul_int(capital);

        PoolSettlement {
            rewards,
            capital,
            claims_applied,
            snapshot: PoolSnapshot {
                liquidity_index: current,
                claim_index: log.len(),
            },
        }
    }

    /// Adopt a settlement's capital and snapshots
    pub fn apply(&mut self, settlement: &RewardSettlement) {
        self.capital = settlement.capital;
        self.snapshots = settlement.snapshots.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquidity::index::ClaimLogEntry;

    fn position(capital: u128, pools: &[u64]) -> LpPosition {
        LpPosition {
            id: PositionId(0),
            capital,
            pool_ids: pools.iter().copied().map(PoolId).collect(),
            snapshots: pools
                .iter()
                .map(|p| (PoolId(*p), PoolSnapshot::default()))
                .collect(),
        }
    }

    fn ray(s: &str) -> Ray {
        s.parse().unwrap()
    }

    #[test]
    fn test_rewards_without_claims() {
        let position = position(1_000, &[0]);
        let indices = BTreeMap::from([(PoolId(0), ray("0.018"))]);
        let settlement = position.settle(&BTreeMap::new(), &indices);

        assert_eq!(settlement.rewards, 18);
        assert_eq!(settlement.capital, 1_000);
        assert_eq!(settlement.claims_applied, 0);
        assert_eq!(settlement.snapshots[&PoolId(0)].liquidity_index, ray("0.018"));
    }

    #[test]
    fn test_claim_splits_reward_periods() {
        let position = position(1_000, &[0]);
        let mut log = ClaimLog::new();
        log.push(ClaimLogEntry {
            from_pool: PoolId(0),
            ratio: ray("0.25"),
            amount: 250,
            paying_capital: 1_000,
            liquidity_index_before_claim: ray("0.01"),
            timestamp: 0,
        });
        let logs = BTreeMap::from([(PoolId(0), log)]);
        let indices = BTreeMap::from([(PoolId(0), ray("0.03"))]);

        let settlement = position.settle(&logs, &indices);
        // 1_000 * 0.01 before the claim, 750 * 0.02 after
        assert_eq!(settlement.rewards, 25);
        assert_eq!(settlement.capital, 750);
        assert_eq!(settlement.claims_applied, 1);
        assert_eq!(settlement.snapshots[&PoolId(0)].claim_index, 1);
    }

    #[test]
    fn test_claims_from_outside_pools_are_skipped() {
        let position = position(1_000, &[0]);
        let mut log = ClaimLog::new();
        log.push(ClaimLogEntry {
            from_pool: PoolId(5),
            ratio: ray("0.5"),
            amount: 500,
            paying_capital: 1_000,
            liquidity_index_before_claim: ray("0.01"),
            timestamp: 0,
        });
        let logs = BTreeMap::from([(PoolId(0), log)]);
        let settlement = position.settle(&logs, &BTreeMap::new());

        assert_eq!(settlement.capital, 1_000);
        assert_eq!(settlement.claims_applied, 0);
        assert_eq!(settlement.snapshots[&PoolId(0)].claim_index, 1);
    }

    #[test]
    fn test_settlement_is_idempotent() {
        let mut position = position(730_000, &[0, 1]);
        let indices = BTreeMap::from([(PoolId(0), ray("0.001")), (PoolId(1), ray("0.002"))]);
        let first = position.settle(&BTreeMap::new(), &indices);
        assert_eq!(first.rewards, 730 + 1_460);

        position.apply(&first);
        let second = position.settle(&BTreeMap::new(), &indices);
        assert_eq!(second.rewards, 0);
        assert_eq!(second.capital, 730_000);
    }
}
