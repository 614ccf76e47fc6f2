//! Cover ledger - per-cover records and the pricing that schedules their expiry
//!
//! A cover's premium budget is consumed at a fixed cost per pool tick. Its
//! expiry tick is the number of whole ticks the budget pays for; any remainder
//! smaller than one tick is scheduled with the expiry and paid to the pool when
//! the cover runs out, so every deposited token is eventually either consumed or
//! refunded.
//!
//! Every method expects the pool to be actualized to the current time already.

use std::collections::BTreeMap;

use athena_common::{AthenaError, CoverId, PoolId, Ray, Result};
use serde::{Deserialize, Serialize};

use crate::pool::{premium_per_tick, Pool, PoolState, ScheduledExpiry};

/// A purchased cover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cover {
    pub id: CoverId,
    pub pool_id: PoolId,
    pub capital_insured: u128,
    /// Tokens deposited over the cover's whole life
    pub premium_deposited: u128,
    /// Rate the cover was last priced at
    pub begin_premium_rate: Ray,
    pub begin_tick: u64,
    /// Premium budget left at `begin_tick`
    pub premium_at_begin: Ray,
    pub premium_per_tick: Ray,
    pub expiry_tick: u64,
    pub closed: bool,
}

impl Cover {
    pub fn is_expired(&self, pool_tick: u64) -> bool {
        pool_tick >= self.expiry_tick
    }

    pub fn is_active(&self, pool_tick: u64) -> bool {
        !self.closed && !self.is_expired(pool_tick)
    }

    /// Premium not yet consumed at `pool_tick`
    pub fn remaining_premium(&self, pool_tick: u64) -> Ray {
        if self.closed || self.is_expired(pool_tick) {
            return Ray::ZERO;
        }
        let elapsed = pool_tick.saturating_sub(self.begin_tick);
        self.premium_at_begin
            .saturating_sub(self.premium_per_tick.mul_int(elapsed as u128))
    }

    pub fn ticks_left(&self, pool_tick: u64) -> u64 {
        if self.closed {
            return 0;
        }
        self.expiry_tick.saturating_sub(pool_tick)
    }
}

/// Capital and premium changes applied to an open cover
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverUpdate {
    pub add_capital: u128,
    pub remove_capital: u128,
    pub add_premium: u128,
    pub remove_premium: u128,
}

impl CoverUpdate {
    pub fn is_empty(&self) -> bool {
        self.add_capital == 0
            && self.remove_capital == 0
            && self.add_premium == 0
            && self.remove_premium == 0
    }
}

/// Result of buying a cover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverReceipt {
    pub cover_id: CoverId,
    pub pool_id: PoolId,
    pub premium_rate: Ray,
    pub premium_per_tick: Ray,
    pub duration_ticks: u64,
    pub expiry_tick: u64,
}

/// Result of changing a cover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverUpdateOutcome {
    pub cover_id: CoverId,
    pub capital_insured: u128,
    pub premium_rate: Ray,
    pub premium_per_tick: Ray,
    pub expiry_tick: u64,
    pub remaining_premium: Ray,
    /// Tokens handed back to the cover holder
    pub released_premium: u128,
}

/// Result of closing a cover early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverClosure {
    pub cover_id: CoverId,
    /// Whole tokens refunded; the fractional remainder goes to the pool
    pub released_premium: u128,
}

/// Price of a prospective cover, computed without touching the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverQuote {
    pub premium_rate: Ray,
    pub seconds_per_tick: Ray,
    pub premium_per_tick: Ray,
    pub duration_ticks: u64,
    /// Seconds the premium lasts if the rate never moves again
    pub estimated_seconds: u64,
}

/// Read-only snapshot of a cover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverView {
    pub cover_id: CoverId,
    pub pool_id: PoolId,
    pub capital_insured: u128,
    pub premium_deposited: u128,
    pub premium_rate: Ray,
    pub premium_per_tick: Ray,
    pub expiry_tick: u64,
    pub remaining_premium: Ray,
    pub ticks_left: u64,
    pub expired: bool,
    pub closed: bool,
}

/// Pricing of `capital` with a `budget` of premium against a pool that does not
/// yet carry it
fn price(state: &PoolState, pool: PoolId, capital: u128, budget: Ray) -> Result<(CoverQuote, Ray)> {
    if capital == 0 || budget.is_zero() {
        return Err(AthenaError::ForbiddenZeroValue);
    }
    let available = state.available_capacity();
    if capital > available {
        return Err(AthenaError::InsufficientCapacity {
            pool,
            requested: capital,
            available,
        });
    }

    let rate = state
        .curve
        .rate_for(state.total_insured_capital + capital, state.available_capital);
    let seconds_per_tick = state.seconds_per_tick_at(rate);
    let per_tick = premium_per_tick(capital, rate, seconds_per_tick);
    let duration = budget.quotient(per_tick)?;
    let duration = u64::try_from(duration)
        .unwrap_or(u64::MAX)
        .min(u64::MAX - state.tick);
    if duration == 0 {
        return Err(AthenaError::DurationBelowOneTick);
    }
    let unspent = budget - per_tick.mul_int(duration as u128);

    let estimated_seconds = seconds_per_tick.mul_int(duration as u128).floor();
    let quote = CoverQuote {
        premium_rate: rate,
        seconds_per_tick,
        premium_per_tick: per_tick,
        duration_ticks: duration,
        estimated_seconds: u64::try_from(estimated_seconds).unwrap_or(u64::MAX),
    };
    Ok((quote, unspent))
}

/// Quote a cover on a pool's current state
pub fn quote_cover(pool: &Pool, capital: u128, premium: u128) -> Result<CoverQuote> {
    price(&pool.state, pool.id, capital, Ray::from_int(premium)).map(|(quote, _)| quote)
}

/// Every cover, open or not
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverLedger {
    covers: BTreeMap<CoverId, Cover>,
    next_id: u64,
}

impl CoverLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: CoverId) -> Result<&Cover> {
        self.covers.get(&id).ok_or(AthenaError::CoverNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.covers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.covers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cover> {
        self.covers.values()
    }

    /// Id the next opened cover will get
    pub fn peek_id(&self) -> CoverId {
        CoverId(self.next_id)
    }

    /// Buy `capital` of cover on `pool` with `premium` tokens
    pub fn open_cover(&mut self, pool: &mut Pool, capital: u128, premium: u128) -> Result<CoverReceipt> {
        let budget = Ray::from_int(premium);
        let (quote, unspent) = price(&pool.state, pool.id, capital, budget)?;

        let id = self.peek_id();
        let begin_tick = pool.state.tick;
        let expiry_tick = begin_tick + quote.duration_ticks;
        pool.insure(
            id,
            expiry_tick,
            ScheduledExpiry {
                capital,
                premium_per_tick: quote.premium_per_tick,
                unspent_premium: unspent,
            },
        );

        self.covers.insert(
            id,
            Cover {
                id,
                pool_id: pool.id,
                capital_insured: capital,
                premium_deposited: premium,
                begin_premium_rate: quote.premium_rate,
                begin_tick,
                premium_at_begin: budget,
                premium_per_tick: quote.premium_per_tick,
                expiry_tick,
                closed: false,
            },
        );
        self.next_id += 1;

        Ok(CoverReceipt {
            cover_id: id,
            pool_id: pool.id,
            premium_rate: quote.premium_rate,
            premium_per_tick: quote.premium_per_tick,
            duration_ticks: quote.duration_ticks,
            expiry_tick,
        })
    }

    /// Change an open cover's capital and/or premium and reschedule it from the current tick
    pub fn update_cover(&mut self, pool: &mut Pool, id: CoverId, update: CoverUpdate) -> Result<CoverUpdateOutcome> {
        let cover = self.open_cover_on(pool, id)?;
        if update.is_empty() {
            return Err(AthenaError::ForbiddenZeroValue);
        }

        let tick = pool.state.tick;
        let remaining = cover.remaining_premium(tick);
        let budget = remaining + Ray::from_int(update.add_premium);
        let removed = Ray::from_int(update.remove_premium);
        if removed > budget {
            return Err(AthenaError::InsufficientPremium {
                requested: update.remove_premium,
                remaining: budget.floor(),
            });
        }
        let budget = budget - removed;

        let capital = cover
            .capital_insured
            .checked_add(update.add_capital)
            .and_then(|c| c.checked_sub(update.remove_capital))
            .filter(|c| *c > 0)
            .ok_or(AthenaError::ForbiddenZeroValue)?;

        // Price against the pool without this cover's own capital
        let mut staged = pool.clone();
        staged
            .release(id, cover.expiry_tick)
            .ok_or(AthenaError::CoverNotFound(id))?;
        let (quote, unspent) = price(&staged.state, pool.id, capital, budget)?;

        let expiry_tick = tick + quote.duration_ticks;
        staged.insure(
            id,
            expiry_tick,
            ScheduledExpiry {
                capital,
                premium_per_tick: quote.premium_per_tick,
                unspent_premium: unspent,
            },
        );
        *pool = staged;

        let cover = Cover {
            capital_insured: capital,
            premium_deposited: cover.premium_deposited + update.add_premium,
            begin_premium_rate: quote.premium_rate,
            begin_tick: tick,
            premium_at_begin: budget,
            premium_per_tick: quote.premium_per_tick,
            expiry_tick,
            ..cover
        };
        self.covers.insert(id, cover);

        Ok(CoverUpdateOutcome {
            cover_id: id,
            capital_insured: capital,
            premium_rate: quote.premium_rate,
            premium_per_tick: quote.premium_per_tick,
            expiry_tick,
            remaining_premium: budget,
            released_premium: update.remove_premium,
        })
    }

    /// Stop a cover before expiry and refund its unspent premium
    pub fn close_cover(&mut self, pool: &mut Pool, id: CoverId) -> Result<CoverClosure> {
        let cover = self.open_cover_on(pool, id)?;
        let remaining = cover.remaining_premium(pool.state.tick);

        pool.release(id, cover.expiry_tick)
            .ok_or(AthenaError::CoverNotFound(id))?;
        let released = remaining.floor();
        pool.state
            .credit_income(remaining - Ray::from_int(released));

        if let Some(stored) = self.covers.get_mut(&id) {
            stored.closed = true;
        }
        Ok(CoverClosure {
            cover_id: id,
            released_premium: released,
        })
    }

    /// Snapshot of a cover against the given pool state
    pub fn view(&self, state: &PoolState, id: CoverId) -> Result<CoverView> {
        let cover = self.get(id)?;
        Ok(CoverView {
            cover_id: cover.id,
            pool_id: cover.pool_id,
            capital_insured: cover.capital_insured,
            premium_deposited: cover.premium_deposited,
            premium_rate: cover.begin_premium_rate,
            premium_per_tick: cover.premium_per_tick,
            expiry_tick: cover.expiry_tick,
            remaining_premium: cover.remaining_premium(state.tick),
            ticks_left: cover.ticks_left(state.tick),
            expired: cover.is_expired(state.tick),
            closed: cover.closed,
        })
    }

    /// Copy of a cover that can still be changed on `pool`
    fn open_cover_on(&self, pool: &Pool, id: CoverId) -> Result<Cover> {
        let cover = self.get(id)?;
        if cover.pool_id != pool.id {
            return Err(AthenaError::CoverNotFound(id));
        }
        if cover.closed {
            return Err(AthenaError::CoverIsClosed(id));
        }
        if cover.is_expired(pool.state.tick) {
            return Err(AthenaError::CoverIsExpired(id));
        }
        Ok(cover.clone())
    }
}
