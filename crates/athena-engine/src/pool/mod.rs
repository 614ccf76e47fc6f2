//! Pools - capital state, expiry schedule and the actualizer that advances them
//!
//! - [`state`]: rates, capital totals and the tick clock
//! - [`expiry`]: covers ordered by the tick their premium runs out
//! - [`actualizer`]: lazy time advancement

pub mod actualizer;
pub mod expiry;
pub mod state;

use std::collections::BTreeSet;

use athena_common::{CoverId, PoolId, Result};
use serde::{Deserialize, Serialize};

pub use actualizer::{actualize_until, preview_actualize_until, Actualization};
pub use expiry::{ExpiryQueue, ScheduledExpiry};
pub use state::{daily_premium, premium_per_tick, PoolState};

use crate::curve::PremiumCurve;

/// A pool and everything the actualizer needs to advance it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub state: PoolState,
    pub expiries: ExpiryQueue,
    /// Pools whose capital may never be combined with this one
    pub incompatible: BTreeSet<PoolId>,
}

impl Pool {
    pub fn new(id: PoolId, curve: PremiumCurve, timestamp: u64) -> Self {
        Self {
            id,
            state: PoolState::new(curve, timestamp),
            expiries: ExpiryQueue::new(),
            incompatible: BTreeSet::new(),
        }
    }

    pub fn actualize(&mut self, target: u64) -> Result<Actualization> {
        actualize_until(&mut self.state, &mut self.expiries, target)
    }

    /// State the pool would have at `target`, without advancing it
    pub fn preview(&self, target: u64) -> Result<PoolState> {
        preview_actualize_until(&self.state, &self.expiries, target).map(|(state, _)| state)
    }

    pub fn is_compatible_with(&self, other: PoolId) -> bool {
        !self.incompatible.contains(&other)
    }

    /// Take on a cover: capital, per-tick cost and expiry are all added together
    pub(crate) fn insure(&mut self, cover: CoverId, expiry_tick: u64, expiry: ScheduledExpiry) {
        self.state.total_insured_capital += expiry.capital;
        self.state.premium_per_tick += expiry.premium_per_tick;
        self.state.remaining_covers += 1;
        self.expiries.schedule(expiry_tick, cover, expiry);
        self.state.refresh_rates();
    }

    /// Drop a still-active cover before its expiry
    pub(crate) fn release(&mut self, cover: CoverId, expiry_tick: u64) -> Option<ScheduledExpiry> {
        let expiry = self.expiries.cancel(expiry_tick, cover)?;
        self.state.total_insured_capital = self
            .state
            .total_insured_capital
            .saturating_sub(expiry.capital);
        self.state.premium_per_tick -= expiry.premium_per_tick;
        self.state.remaining_covers = self.state.remaining_covers.saturating_sub(1);
        self.state.refresh_rates();
        Some(expiry)
    }
}
