//! Registry - owner of every pool, cover, position and the intersection table
//!
//! Mutations are all-or-nothing. Each one clones the pools it touches,
//! actualizes the clones to the call's timestamp, applies the operation there
//! and only writes them back once every step succeeded. Views run on previews
//! and never advance a pool.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU128;

use athena_common::{AthenaError, CoverId, PoolId, PositionId, Ray, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::EngineConfig;
use crate::cover::{
    quote_cover, CoverClosure, CoverLedger, CoverQuote, CoverReceipt, CoverUpdate,
    CoverUpdateOutcome, CoverView,
};
use crate::curve::PremiumCurve;
use crate::intersection::{ClaimImpact, IntersectionTracker};
use crate::liquidity::{ClaimLogEntry, LiquidityLedger, LpPosition, RewardSettlement};
use crate::pool::{Pool, PoolState};

/// Result of withdrawing capital from a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub position: PositionId,
    pub amount: u128,
    /// Rewards settled on the way out
    pub rewards: u128,
    pub remaining_capital: u128,
}

/// Result of paying a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub pool: PoolId,
    pub amount: u128,
    pub ratio: Ray,
    /// Index of the claim in the paying pool's log
    pub claim_index: usize,
    /// Capital lost by every pool the claim reached, paying pool included
    pub impacts: Vec<ClaimImpact>,
}

type Staged = BTreeMap<PoolId, Pool>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    config: EngineConfig,
    pools: BTreeMap<PoolId, Pool>,
    covers: CoverLedger,
    liquidity: LiquidityLedger,
    intersections: IntersectionTracker,
    next_pool: u64,
}

impl Registry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self, id: PoolId) -> Result<&Pool> {
        self.pools.get(&id).ok_or(AthenaError::PoolDoesNotExist(id))
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    pub fn covers(&self) -> &CoverLedger {
        &self.covers
    }

    pub fn liquidity(&self) -> &LiquidityLedger {
        &self.liquidity
    }

    // ----- staging -----

    /// Clones of `ids` actualized to `now`
    fn stage(&self, ids: impl IntoIterator<Item = PoolId>, now: u64) -> Result<Staged> {
        let mut staged = Staged::new();
        for id in ids {
            let mut pool = self.pool(id)?.clone();
            pool.actualize(now)?;
            staged.insert(id, pool);
        }
        Ok(staged)
    }

    fn commit(&mut self, staged: Staged) {
        self.pools.extend(staged);
    }

    fn staged_mut(staged: &mut Staged, id: PoolId) -> Result<&mut Pool> {
        staged.get_mut(&id).ok_or(AthenaError::PoolDoesNotExist(id))
    }

    fn staged_indices(staged: &Staged) -> BTreeMap<PoolId, Ray> {
        staged
            .iter()
            .map(|(id, pool)| (*id, pool.state.liquidity_index))
            .collect()
    }

    // ----- pools -----

    /// Create a pool; incompatibility is recorded on both sides
    #[instrument(skip(self, curve))]
    pub fn create_pool(&mut self, curve: PremiumCurve, incompatible_with: &[PoolId], now: u64) -> Result<PoolId> {
        for other in incompatible_with {
            self.pool(*other)?;
        }

        let id = PoolId(self.next_pool);
        let mut pool = Pool::new(id, curve, now);
        pool.incompatible.extend(incompatible_with.iter().copied());
        for other in incompatible_with {
            if let Some(other) = self.pools.get_mut(other) {
                other.incompatible.insert(id);
            }
        }
        self.pools.insert(id, pool);
        self.next_pool += 1;

        info!(pool = %id, "Pool created");
        Ok(id)
    }

    /// Pool created with the configured default curve
    pub fn create_default_pool(&mut self, incompatible_with: &[PoolId], now: u64) -> Result<PoolId> {
        let curve = self.config.default_curve.to_curve()?;
        self.create_pool(curve, incompatible_with, now)
    }

    /// Advance a pool to `now`, returning the covers that expired on the way
    #[instrument(skip(self))]
    pub fn actualize(&mut self, pool: PoolId, now: u64) -> Result<Vec<CoverId>> {
        let mut staged = self.pool(pool)?.clone();
        let expired = staged.actualize(now)?.expired;
        self.pools.insert(pool, staged);
        Ok(expired)
    }

    // ----- covers -----

    #[instrument(skip(self))]
    pub fn open_cover(&mut self, pool: PoolId, capital: u128, premium: u128, now: u64) -> Result<CoverReceipt> {
        let mut staged = self.stage([pool], now)?;
        let receipt = self
            .covers
            .open_cover(Self::staged_mut(&mut staged, pool)?, capital, premium)?;
        self.commit(staged);

        debug!(
            cover = %receipt.cover_id,
            rate = %receipt.premium_rate,
            expiry_tick = receipt.expiry_tick,
            "Cover opened"
        );
        Ok(receipt)
    }

    #[instrument(skip(self))]
    pub fn update_cover(&mut self, cover: CoverId, update: CoverUpdate, now: u64) -> Result<CoverUpdateOutcome> {
        let pool = self.covers.get(cover)?.pool_id;
        let mut staged = self.stage([pool], now)?;
        let outcome = self
            .covers
            .update_cover(Self::staged_mut(&mut staged, pool)?, cover, update)?;
        self.commit(staged);
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub fn close_cover(&mut self, cover: CoverId, now: u64) -> Result<CoverClosure> {
        let pool = self.covers.get(cover)?.pool_id;
        let mut staged = self.stage([pool], now)?;
        let closure = self
            .covers
            .close_cover(Self::staged_mut(&mut staged, pool)?, cover)?;
        self.commit(staged);
        Ok(closure)
    }

    // ----- liquidity -----

    /// Deposit `amount` backing every pool in `pool_ids`
    #[instrument(skip(self, pool_ids))]
    pub fn deposit(&mut self, pool_ids: impl IntoIterator<Item = PoolId>, amount: u128, now: u64) -> Result<PositionId> {
        let pool_ids: BTreeSet<PoolId> = pool_ids.into_iter().collect();
        if amount == 0 || pool_ids.is_empty() {
            return Err(AthenaError::ForbiddenZeroValue);
        }
        if pool_ids.len() > self.config.max_pools_per_position {
            return Err(AthenaError::TooManyPools {
                count: pool_ids.len(),
                max: self.config.max_pools_per_position,
            });
        }
        self.check_compatible(&pool_ids)?;

        let mut staged = self.stage(pool_ids.iter().copied(), now)?;
        for pool in staged.values_mut() {
            pool.state.available_capital += amount;
            pool.state.refresh_rates();
        }
        let indices = Self::staged_indices(&staged);

        self.commit(staged);
        self.intersections.add_liquidity(&pool_ids, amount);
        let id = self.liquidity.open_position(pool_ids, amount, &indices);

        debug!(position = %id, amount, "Liquidity deposited");
        Ok(id)
    }

    /// Settle rewards, then grow the position by `amount`
    #[instrument(skip(self))]
    pub fn add_liquidity(&mut self, position: PositionId, amount: u128, now: u64) -> Result<RewardSettlement> {
        if amount == 0 {
            return Err(AthenaError::ForbiddenZeroValue);
        }
        let pool_ids = self.liquidity.position(position)?.pool_ids.clone();

        let mut staged = self.stage(pool_ids.iter().copied(), now)?;
        let settlement = self
            .liquidity
            .settle(position, &Self::staged_indices(&staged))?;
        for pool in staged.values_mut() {
            pool.state.available_capital += amount;
            pool.state.refresh_rates();
        }

        self.liquidity
            .commit(&settlement, settlement.capital + amount)?;
        self.commit(staged);
        self.intersections.add_liquidity(&pool_ids, amount);
        Ok(settlement)
    }

    /// Realize rewards, keeping the capital in place
    #[instrument(skip(self))]
    pub fn take_interest(&mut self, position: PositionId, now: u64) -> Result<RewardSettlement> {
        let pool_ids = self.liquidity.position(position)?.pool_ids.clone();
        let staged = self.stage(pool_ids, now)?;
        let settlement = self
            .liquidity
            .settle(position, &Self::staged_indices(&staged))?;

        self.liquidity.commit(&settlement, settlement.capital)?;
        self.commit(staged);
        Ok(settlement)
    }

    /// Settle rewards and take `amount` of capital out of every pool of the position
    #[instrument(skip(self))]
    pub fn withdraw(&mut self, position: PositionId, amount: u128, now: u64) -> Result<Withdrawal> {
        if amount == 0 {
            return Err(AthenaError::ForbiddenZeroValue);
        }
        let pool_ids = self.liquidity.position(position)?.pool_ids.clone();

        let mut staged = self.stage(pool_ids.iter().copied(), now)?;
        let settlement = self
            .liquidity
            .settle(position, &Self::staged_indices(&staged))?;
        if amount > settlement.capital {
            return Err(AthenaError::InsufficientLiquidity {
                position,
                requested: amount,
                available: settlement.capital,
            });
        }
        for pool in staged.values_mut() {
            let capacity = pool.state.available_capacity();
            if amount > capacity {
                return Err(AthenaError::InsufficientCapacity {
                    pool: pool.id,
                    requested: amount,
                    available: capacity,
                });
            }
            pool.state.available_capital -= amount;
            pool.state.refresh_rates();
        }

        let remaining = settlement.capital - amount;
        self.liquidity.commit(&settlement, remaining)?;
        self.commit(staged);
        self.intersections.remove_liquidity(&pool_ids, amount);

        debug!(position = %position, amount, remaining, "Liquidity withdrawn");
        Ok(Withdrawal {
            position,
            amount,
            rewards: settlement.rewards,
            remaining_capital: remaining,
        })
    }

    fn check_compatible(&self, pool_ids: &BTreeSet<PoolId>) -> Result<()> {
        for id in pool_ids {
            let pool = self.pool(*id)?;
            if let Some(other) = pool_ids.iter().find(|other| !pool.is_compatible_with(**other)) {
                return Err(AthenaError::IncompatiblePools {
                    pool: *id,
                    other: *other,
                });
            }
        }
        Ok(())
    }

    // ----- claims -----

    /// Pay a finalized claim from `pool` and spread the loss to every pool sharing its capital
    #[instrument(skip(self))]
    pub fn record_claim(&mut self, pool: PoolId, amount: u128, timestamp: u64) -> Result<ClaimReceipt> {
        if amount == 0 {
            return Err(AthenaError::ForbiddenZeroValue);
        }
        self.pool(pool)?;

        let mut related = self.intersections.related_pools(pool);
        related.insert(pool);
        let mut staged = self.stage(related, timestamp)?;

        let available = Self::staged_mut(&mut staged, pool)?.state.available_capital;
        let paying_capital = NonZeroU128::new(available)
            .filter(|capital| amount <= capital.get())
            .ok_or(AthenaError::InsufficientCapacity {
                pool,
                requested: amount,
                available,
            })?;
        let ratio = Ray::from_ratio(amount, available)?;

        let mut intersections = self.intersections.clone();
        let impacts = intersections.propagate_claim(pool, amount, paying_capital);

        let mut entries = Vec::with_capacity(impacts.len());
        for impact in &impacts {
            let affected = Self::staged_mut(&mut staged, impact.pool)?;
            entries.push((
                impact.pool,
                ClaimLogEntry {
                    from_pool: pool,
                    ratio,
                    amount,
                    paying_capital: available,
                    liquidity_index_before_claim: affected.state.liquidity_index,
                    timestamp,
                },
            ));
            affected.state.available_capital = affected
                .state
                .available_capital
                .saturating_sub(impact.loss);
            affected.state.refresh_rates();
        }

        self.commit(staged);
        self.intersections = intersections;
        let mut claim_index = self.liquidity.claim_log_len(pool);
        for (affected, entry) in entries {
            let index = self.liquidity.log_claim(affected, entry);
            if affected == pool {
                claim_index = index;
            }
        }

        info!(
            pool = %pool,
            amount,
            ratio = %ratio,
            affected = impacts.len(),
            "Claim recorded"
        );
        Ok(ClaimReceipt {
            pool,
            amount,
            ratio,
            claim_index,
            impacts,
        })
    }

    // ----- views -----

    pub fn pool_state(&self, pool: PoolId) -> Result<&PoolState> {
        Ok(&self.pool(pool)?.state)
    }

    /// State `pool` would have at `now`
    pub fn preview_pool(&self, pool: PoolId, now: u64) -> Result<PoolState> {
        self.pool(pool)?.preview(now)
    }

    pub fn premium_rate(&self, pool: PoolId, now: u64) -> Result<Ray> {
        Ok(self.preview_pool(pool, now)?.premium_rate)
    }

    pub fn available_capacity(&self, pool: PoolId, now: u64) -> Result<u128> {
        Ok(self.preview_pool(pool, now)?.available_capacity())
    }

    pub fn quote_cover(&self, pool: PoolId, capital: u128, premium: u128, now: u64) -> Result<CoverQuote> {
        let staged = self.stage([pool], now)?;
        let pool = staged.get(&pool).ok_or(AthenaError::PoolDoesNotExist(pool))?;
        quote_cover(pool, capital, premium)
    }

    pub fn cover_view(&self, cover: CoverId, now: u64) -> Result<CoverView> {
        let pool = self.covers.get(cover)?.pool_id;
        let state = self.preview_pool(pool, now)?;
        self.covers.view(&state, cover)
    }

    /// Rewards and capital the position would settle at `now`
    pub fn rewards_of(&self, position: PositionId, now: u64) -> Result<RewardSettlement> {
        let pool_ids = &self.liquidity.position(position)?.pool_ids;
        let mut indices = BTreeMap::new();
        for pool in pool_ids {
            indices.insert(*pool, self.preview_pool(*pool, now)?.liquidity_index);
        }
        self.liquidity.settle(position, &indices)
    }

    pub fn position(&self, position: PositionId) -> Result<&LpPosition> {
        self.liquidity.position(position)
    }

    pub fn claim_log(&self, pool: PoolId) -> Result<&[ClaimLogEntry]> {
        self.pool(pool)?;
        Ok(self
            .liquidity
            .claim_log(pool)
            .map(|log| log.entries())
            .unwrap_or(&[]))
    }

    pub fn shared_capital(&self, a: PoolId, b: PoolId) -> u128 {
        self.intersections.shared_capital(a, b)
    }
}
