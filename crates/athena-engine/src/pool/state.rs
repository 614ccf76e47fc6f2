//! PoolState - the per-pool snapshot advanced by the actualizer
//!
//! The pool clock counts ticks, not seconds. A tick lasts
//! `86_400 * r0 / premium_rate` seconds, so `premium_rate * seconds_per_tick`
//! never changes: a cover's premium cost per tick is fixed when it is scheduled
//! and its expiry tick stays exact however the rate moves afterwards.

use std::num::NonZeroU128;

use athena_common::{Ray, SECONDS_PER_DAY, YEARLY_PERCENT_DIVISOR};
use serde::{Deserialize, Serialize};

use crate::curve::{utilization, PremiumCurve};

const DAILY_DIVISOR: NonZeroU128 = match NonZeroU128::new(YEARLY_PERCENT_DIVISOR) {
    Some(d) => d,
    None => panic!("yearly divisor is non-zero"),
};

const TICK_DIVISOR: NonZeroU128 =
    match NonZeroU128::new(YEARLY_PERCENT_DIVISOR * SECONDS_PER_DAY as u128) {
        Some(d) => d,
        None => panic!("tick divisor is non-zero"),
    };

/// Mutable per-pool state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Pool clock, only advanced by the actualizer
    pub tick: u64,
    /// Current annual premium rate (percent, ray)
    pub premium_rate: Ray,
    /// Premium consumed per day by all active covers
    pub emission_rate: Ray,
    /// Wall seconds represented by one tick
    pub seconds_per_tick: Ray,
    pub total_insured_capital: u128,
    pub available_capital: u128,
    pub remaining_covers: u32,
    /// Sum of the per-tick premium cost of every active cover
    pub premium_per_tick: Ray,
    /// Premium consumed since the pool was created
    pub cumulative_premium_spent: Ray,
    /// Cumulative reward per unit of capital
    pub liquidity_index: Ray,
    pub last_update_timestamp: u64,
    pub curve: PremiumCurve,
}

impl PoolState {
    /// Create an empty pool at the idle baseline rate
    pub fn new(curve: PremiumCurve, timestamp: u64) -> Self {
        let mut state = Self {
            tick: 0,
            premium_rate: curve.base_rate(),
            emission_rate: Ray::ZERO,
            seconds_per_tick: Ray::ZERO,
            total_insured_capital: 0,
            available_capital: 0,
            remaining_covers: 0,
            premium_per_tick: Ray::ZERO,
            cumulative_premium_spent: Ray::ZERO,
            liquidity_index: Ray::ZERO,
            last_update_timestamp: timestamp,
            curve,
        };
        state.refresh_rates();
        state
    }

    /// Insured over available capital
    pub fn utilization(&self) -> Ray {
        utilization(self.total_insured_capital, self.available_capital)
    }

    /// Capital still free to insure
    pub fn available_capacity(&self) -> u128 {
        self.available_capital
            .saturating_sub(self.total_insured_capital)
    }

    /// A claim can leave a pool insuring more than it holds
    pub fn is_over_utilized(&self) -> bool {
        self.total_insured_capital > self.available_capital
    }

    /// Tick length at a given premium rate
    pub fn seconds_per_tick_at(&self, rate: Ray) -> Ray {
        Ray::from_int(SECONDS_PER_DAY as u128)
            .ray_mul(self.curve.base_rate())
            .ray_div(rate)
            .unwrap_or_else(|_| unreachable!("premium rate never drops below r0 > 0"))
    }

    /// Recompute rate, emission and tick length from the capital snapshot
    pub fn refresh_rates(&mut self) {
        self.premium_rate = self
            .curve
            .rate_for(self.total_insured_capital, self.available_capital);
        self.emission_rate = daily_premium(self.total_insured_capital, self.premium_rate);
        self.seconds_per_tick = self.seconds_per_tick_at(self.premium_rate);
    }

    /// Consume `ticks` of premium and grow the liquidity index
    ///
    /// Returns the premium consumed.
    pub(crate) fn accrue(&mut self, ticks: u64) -> Ray {
        let spent = self.premium_per_tick.mul_int(ticks as u128);
        self.credit_income(spent);
        spent
    }

    /// Distribute premium to the capital currently in the pool
    pub(crate) fn credit_income(&mut self, amount: Ray) {
        if amount.is_zero() {
            return;
        }
        self.cumulative_premium_spent += amount;
        if let Some(capital) = NonZeroU128::new(self.available_capital) {
            self.liquidity_index += amount.div_nonzero(capital);
        }
    }

    /// Wall seconds covered by `ticks` at the current tick length, rounded down
    pub fn seconds_for_ticks(&self, ticks: u64) -> u64 {
        let seconds = self.seconds_per_tick.mul_int(ticks as u128).floor();
        u64::try_from(seconds).unwrap_or(u64::MAX)
    }

    /// Whole ticks elapsed over `seconds` at the current tick length
    pub fn ticks_for_seconds(&self, seconds: u64) -> u64 {
        let ticks = Ray::from_int(seconds as u128)
            .quotient(self.seconds_per_tick)
            .unwrap_or_else(|_| unreachable!("seconds_per_tick is always positive"));
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }
}

/// Premium consumed per day by `capital` insured at `rate`
pub fn daily_premium(capital: u128, rate: Ray) -> Ray {
    rate.mul_int(capital).div_nonzero(DAILY_DIVISOR)
}

/// Premium consumed per tick by `capital` insured at `rate` with ticks of `seconds_per_tick`
pub fn premium_per_tick(capital: u128, rate: Ray, seconds_per_tick: Ray) -> Ray {
    rate.ray_mul(seconds_per_tick)
        .mul_int(capital)
        .div_nonzero(TICK_DIVISOR)
}
