//! Actualizer - advance a pool from its last update to a wall-clock target
//!
//! Time is consumed one expiry at a time. Between two expiries the premium rate
//! and tick length are constant, so accrual is a single multiplication; at each
//! expiry the cover's capital and per-tick cost leave the pool and the rates are
//! recomputed before the next segment.

use athena_common::{AthenaError, CoverId, Ray, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::expiry::{ExpiryQueue, ScheduledExpiry};
use super::state::PoolState;

/// What one actualization did to a pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actualization {
    pub from_tick: u64,
    pub to_tick: u64,
    /// Premium moved into the liquidity index, expiry dust included
    pub premium_spent: Ray,
    /// Covers whose premium ran out, in expiry order
    pub expired: Vec<CoverId>,
}

impl Actualization {
    pub fn ticks(&self) -> u64 {
        self.to_tick - self.from_tick
    }
}

/// Bring `state` forward to `target`, expiring covers on the way
///
/// Idempotent: a second call with the same target does nothing. The clock
/// lands on `target` even when the last tick is incomplete and those seconds
/// are not carried over, so a pool actualized more often than once per tick
/// stops ticking until the gap between calls covers a whole tick.
pub fn actualize_until(
    state: &mut PoolState,
    expiries: &mut ExpiryQueue,
    target: u64,
) -> Result<Actualization> {
    if target < state.last_update_timestamp {
        return Err(AthenaError::TimeTravelNotAllowed {
            last_update: state.last_update_timestamp,
            target,
        });
    }

    let mut report = Actualization {
        from_tick: state.tick,
        to_tick: state.tick,
        ..Default::default()
    };

    loop {
        let elapsed = state.ticks_for_seconds(target - state.last_update_timestamp);
        let horizon = state.tick.saturating_add(elapsed);

        match expiries.peek_tick() {
            Some(due) if due <= horizon => {
                let steps = due.saturating_sub(state.tick);
                report.premium_spent += state.accrue(steps);
                state.last_update_timestamp += state.seconds_for_ticks(steps);
                state.tick = due;

                for (cover, expiry) in expiries.pop_tick(due) {
                    report.premium_spent += release(state, &expiry);
                    report.expired.push(cover);
                    trace!(cover = %cover, tick = due, "Cover expired");
                }
                state.refresh_rates();
            }
            _ => {
                report.premium_spent += state.accrue(elapsed);
                state.tick = horizon;
                state.last_update_timestamp = target;
                break;
            }
        }
    }

    report.to_tick = state.tick;
    if report.to_tick != report.from_tick {
        debug!(
            from_tick = report.from_tick,
            to_tick = report.to_tick,
            expired = report.expired.len(),
            premium_spent = %report.premium_spent,
            "Pool actualized"
        );
    }
    Ok(report)
}

/// Same as [`actualize_until`] on copies; the inputs are untouched
pub fn preview_actualize_until(
    state: &PoolState,
    expiries: &ExpiryQueue,
    target: u64,
) -> Result<(PoolState, Actualization)> {
    let mut state = state.clone();
    let mut expiries = expiries.clone();
    let report = actualize_until(&mut state, &mut expiries, target)?;
    Ok((state, report))
}

/// Remove an expiring cover from the pool totals and pay out its dust
fn release(state: &mut PoolState, expiry: &ScheduledExpiry) -> Ray {
    state.total_insured_capital = state
        .total_insured_capital
        .checked_sub(expiry.capital)
        .unwrap_or_else(|| panic!("expiring cover insures more than the pool"));
    state.premium_per_tick -= expiry.premium_per_tick;
    state.remaining_covers = state.remaining_covers.saturating_sub(1);
    state.credit_income(expiry.unspent_premium);
    expiry.unspent_premium
}
