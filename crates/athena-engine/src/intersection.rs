//! Intersection tracker - capital shared between pools
//!
//! Capital is kept per exact set of pools a deposit backs. `shared[p][q]` sums
//! the sets holding both `p` and `q`; the diagonal `shared[p][p]` is the
//! capital backing `p`. Both views move together on deposits, withdrawals and
//! claims, so a claim scales every set it reaches and the pair table never
//! keeps capital a claim already consumed.
//!
//! Claim shares round up at every level. A set never holds less than the
//! settled capital of its positions, and a pool's available capital never
//! drops below its diagonal, so every position can always be withdrawn.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU128;

use athena_common::{mul_div_ceil, PoolId};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Capital a pool loses to a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimImpact {
    pub pool: PoolId,
    pub loss: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionTracker {
    shared: BTreeMap<PoolId, BTreeMap<PoolId, u128>>,
    #[serde(with = "pool_sets")]
    sets: BTreeMap<BTreeSet<PoolId>, u128>,
}

impl IntersectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capital shared by `a` and `b`; `a == b` gives the capital backing the pool
    pub fn shared_capital(&self, a: PoolId, b: PoolId) -> u128 {
        self.shared
            .get(&a)
            .and_then(|row| row.get(&b))
            .copied()
            .unwrap_or(0)
    }

    /// Capital deposited for exactly the pools in `pools`
    pub fn set_capital(&self, pools: &BTreeSet<PoolId>) -> u128 {
        self.sets.get(pools).copied().unwrap_or(0)
    }

    /// Pools sharing capital with `pool`, itself included when it holds any
    pub fn related_pools(&self, pool: PoolId) -> BTreeSet<PoolId> {
        self.shared
            .get(&pool)
            .map(|row| row.keys().copied().collect())
            .unwrap_or_default()
    }

    /// A deposit of `amount` backs every pair of pools in the set
    pub fn add_liquidity(&mut self, pools: &BTreeSet<PoolId>, amount: u128) {
        if amount == 0 || pools.is_empty() {
            return;
        }
        *self.sets.entry(pools.clone()).or_default() += amount;
        for a in pools {
            let row = self.shared.entry(*a).or_default();
            for b in pools {
                *row.entry(*b).or_default() += amount;
            }
        }
    }

    /// Undo a deposit of `amount` across the set
    pub fn remove_liquidity(&mut self, pools: &BTreeSet<PoolId>, amount: u128) {
        let removed = match self.sets.get_mut(pools) {
            Some(capital) => {
                let removed = amount.min(*capital);
                *capital -= removed;
                if *capital == 0 {
                    self.sets.remove(pools);
                }
                removed
            }
            None => 0,
        };
        self.shrink_pairs(pools, removed);
    }

    /// Spread a claim of `amount` on `paying` to every pool sharing its capital
    ///
    /// `paying_capital` is the paying pool's capital before the claim. The
    /// paying pool loses exactly `amount`. Every set holding it gives up its
    /// pro-rata share, rounded up, and each other pool loses the sum over the
    /// sets it shares with the paying pool.
    pub fn propagate_claim(&mut self, paying: PoolId, amount: u128, paying_capital: NonZeroU128) -> Vec<ClaimImpact> {
        let mut losses = BTreeMap::from([(paying, amount)]);
        let reached: Vec<(BTreeSet<PoolId>, u128)> = self
            .sets
            .iter()
            .filter(|(pools, _)| pools.contains(&paying))
            .map(|(pools, capital)| (pools.clone(), *capital))
            .collect();

        for (pools, capital) in reached {
            let loss = mul_div_ceil(capital, amount, paying_capital).min(capital);
            trace!(pools = ?pools, capital, loss, "Claim reached pool set");
            for pool in pools.iter().filter(|pool| **pool != paying) {
                *losses.entry(*pool).or_default() += loss;
            }
            self.remove_liquidity(&pools, loss);
        }

        losses
            .into_iter()
            .map(|(pool, loss)| ClaimImpact { pool, loss })
            .collect()
    }

    fn shrink_pairs(&mut self, pools: &BTreeSet<PoolId>, amount: u128) {
        if amount == 0 {
            return;
        }
        for a in pools {
            if let Some(row) = self.shared.get_mut(a) {
                for b in pools {
                    if let Some(shared) = row.get_mut(b) {
                        *shared = shared.saturating_sub(amount);
                    }
                }
                row.retain(|_, shared| *shared > 0);
                if row.is_empty() {
                    self.shared.remove(a);
                }
            }
        }
    }
}

/// Set-keyed maps are written as a list of `(pools, capital)` pairs
mod pool_sets {
    use std::collections::{BTreeMap, BTreeSet};

    use athena_common::PoolId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        sets: &BTreeMap<BTreeSet<PoolId>, u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(sets.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<BTreeSet<PoolId>, u128>, D::Error> {
        let pairs = Vec::<(BTreeSet<PoolId>, u128)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
