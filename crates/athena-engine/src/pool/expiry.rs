//! Expiry queue - covers keyed by the tick at which their premium runs out

use std::collections::BTreeMap;

use athena_common::{CoverId, Ray};
use serde::{Deserialize, Serialize};

/// What the actualizer must undo when a cover expires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledExpiry {
    pub capital: u128,
    pub premium_per_tick: Ray,
    /// Premium left over after the last whole tick, credited at expiry
    pub unspent_premium: Ray,
}

/// Ordered map of expiry tick to the covers ending there
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryQueue {
    by_tick: BTreeMap<u64, BTreeMap<CoverId, ScheduledExpiry>>,
}

impl ExpiryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, tick: u64, cover: CoverId, expiry: ScheduledExpiry) {
        self.by_tick.entry(tick).or_default().insert(cover, expiry);
    }

    /// Remove a cover from its bucket, dropping the bucket once empty
    pub fn cancel(&mut self, tick: u64, cover: CoverId) -> Option<ScheduledExpiry> {
        let bucket = self.by_tick.get_mut(&tick)?;
        let removed = bucket.remove(&cover);
        if bucket.is_empty() {
            self.by_tick.remove(&tick);
        }
        removed
    }

    /// Earliest tick with a scheduled expiry
    pub fn peek_tick(&self) -> Option<u64> {
        self.by_tick.keys().next().copied()
    }

    /// Take every cover expiring at `tick`
    pub fn pop_tick(&mut self, tick: u64) -> BTreeMap<CoverId, ScheduledExpiry> {
        self.by_tick.remove(&tick).unwrap_or_default()
    }

    pub fn contains(&self, tick: u64, cover: CoverId) -> bool {
        self.by_tick
            .get(&tick)
            .is_some_and(|bucket| bucket.contains_key(&cover))
    }

    /// Number of scheduled covers
    pub fn len(&self) -> usize {
        self.by_tick.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tick.is_empty()
    }
}
