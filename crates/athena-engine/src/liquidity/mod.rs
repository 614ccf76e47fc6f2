//! Liquidity ledger - LP positions and the per-pool claim logs they settle against
//!
//! The reward index itself lives in each pool's state; this ledger only keeps
//! what positions need to settle lazily against it.

pub mod index;
pub mod position;

use std::collections::{BTreeMap, BTreeSet};

use athena_common::{AthenaError, PoolId, PositionId, Ray, Result};
use serde::{Deserialize, Serialize};

pub use index::{ClaimLog, ClaimLogEntry};
pub use position::{LpPosition, PoolSnapshot, RewardSettlement};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiquidityLedger {
    positions: BTreeMap<PositionId, LpPosition>,
    claim_logs: BTreeMap<PoolId, ClaimLog>,
    next_id: u64,
}

impl LiquidityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, id: PositionId) -> Result<&LpPosition> {
        self.positions
            .get(&id)
            .ok_or(AthenaError::PositionNotFound(id))
    }

    pub fn positions(&self) -> impl Iterator<Item = &LpPosition> {
        self.positions.values()
    }

    /// Record a new position snapshotted at the current pool indices
    pub fn open_position(
        &mut self,
        pool_ids: BTreeSet<PoolId>,
        capital: u128,
        indices: &BTreeMap<PoolId, Ray>,
    ) -> PositionId {
        let id = PositionId(self.next_id);
        self.next_id += 1;

        let snapshots = pool_ids
            .iter()
            .map(|pool| {
                let snapshot = PoolSnapshot {
                    liquidity_index: indices.get(pool).copied().unwrap_or_default(),
                    claim_index: self.claim_log_len(*pool),
                };
                (*pool, snapshot)
            })
            .collect();

        self.positions.insert(
            id,
            LpPosition {
                id,
                capital,
                pool_ids,
                snapshots,
            },
        );
        id
    }

    /// Settle a position against `indices` without persisting anything
    pub fn settle(&self, id: PositionId, indices: &BTreeMap<PoolId, Ray>) -> Result<RewardSettlement> {
        Ok(self.position(id)?.settle(&self.claim_logs, indices))
    }

    /// Persist a settlement, optionally changing the capital afterwards
    ///
    /// Positions left without capital are removed.
    pub fn commit(&mut self, settlement: &RewardSettlement, capital: u128) -> Result<()> {
        let position = self
            .positions
            .get_mut(&settlement.position)
            .ok_or(AthenaError::PositionNotFound(settlement.position))?;
        position.apply(settlement);
        position.capital = capital;
        if capital == 0 {
            self.positions.remove(&settlement.position);
        }
        Ok(())
    }

    pub fn claim_log(&self, pool: PoolId) -> Option<&ClaimLog> {
        self.claim_logs.get(&pool)
    }

    pub fn claim_log_len(&self, pool: PoolId) -> usize {
        self.claim_logs.get(&pool).map_or(0, ClaimLog::len)
    }

    /// Append a claim to a pool's log, returning its claim index
    pub fn log_claim(&mut self, pool: PoolId, entry: ClaimLogEntry) -> usize {
        self.claim_logs.entry(pool).or_default().push(entry)
    }

    /// Stored capital of every position backing `pool`
    ///
    /// Positions that have not settled since a claim still carry their
    /// pre-claim capital here.
    pub fn capital_in(&self, pool: PoolId) -> u128 {
        self.positions
            .values()
            .filter(|p| p.pool_ids.contains(&pool))
            .map(|p| p.capital)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools(ids: &[u64]) -> BTreeSet<PoolId> {
        ids.iter().copied().map(PoolId).collect()
    }

    #[test]
    fn test_open_snapshots_current_state() {
        let mut ledger = LiquidityLedger::new();
        ledger.log_claim(
            PoolId(0),
            ClaimLogEntry {
                from_pool: PoolId(0),
                ratio: Ray::ZERO,
                amount: 0,
                paying_capital: 0,
                liquidity_index_before_claim: Ray::ZERO,
                timestamp: 0,
            },
        );
        let indices = BTreeMap::from([(PoolId(0), Ray::from_int(2))]);
        let id = ledger.open_position(pools(&[0, 1]), 500, &indices);

        let position = ledger.position(id).unwrap();
        assert_eq!(position.snapshots[&PoolId(0)].claim_index, 1);
        assert_eq!(position.snapshots[&PoolId(0)].liquidity_index, Ray::from_int(2));
        assert_eq!(position.snapshots[&PoolId(1)].claim_index, 0);
        assert_eq!(ledger.capital_in(PoolId(1)), 500);
    }

    #[test]
    fn test_commit_to_zero_removes_position() {
        let mut ledger = LiquidityLedger::new();
        let id = ledger.open_position(pools(&[0]), 100, &BTreeMap::new());
        let settlement = ledger.settle(id, &BTreeMap::new()).unwrap();

        ledger.commit(&settlement, 0).unwrap();
        assert_eq!(ledger.position(id), Err(AthenaError::PositionNotFound(id)));
        assert_eq!(
            ledger.commit(&settlement, 0),
            Err(AthenaError::PositionNotFound(id))
        );
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut ledger = LiquidityLedger::new();
        let a = ledger.open_position(pools(&[0]), 1, &BTreeMap::new());
        let b = ledger.open_position(pools(&[0]), 1, &BTreeMap::new());
        assert_eq!(a, PositionId(0));
        assert_eq!(b, PositionId(1));
    }
}
