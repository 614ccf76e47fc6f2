//! Claim log - append-only record of claims that reached a pool

use std::num::NonZeroU128;

use athena_common::{mul_div_ceil, PoolId, Ray};
use serde::{Deserialize, Serialize};

/// One claim as seen from the pool holding the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimLogEntry {
    /// Pool that paid the claim
    pub from_pool: PoolId,
    /// Share of the paying pool's capital consumed
    pub ratio: Ray,
    /// Tokens paid out
    pub amount: u128,
    /// Paying pool's available capital just before the claim
    pub paying_capital: u128,
    /// This pool's liquidity index just before the claim
    pub liquidity_index_before_claim: Ray,
    pub timestamp: u64,
}

impl ClaimLogEntry {
    /// Capital a position holding `capital` in the paying pool loses
    ///
    /// Rounded up, so the positions of a pool never settle to more capital
    /// than the pool keeps after paying `amount`.
    pub fn loss_on(&self, capital: u128) -> u128 {
        match NonZeroU128::new(self.paying_capital) {
            Some(paying) => mul_div_ceil(capital, self.amount, paying).min(capital),
            None => capital,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimLog {
    entries: Vec<ClaimLogEntry>,
}

impl ClaimLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its claim index
    pub fn push(&mut self, entry: ClaimLogEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ClaimLogEntry> {
        self.entries.get(index)
    }

    /// Entries from `claim_index` onwards
    pub fn since(&self, claim_index: usize) -> &[ClaimLogEntry] {
        self.entries.get(claim_index..).unwrap_or(&[])
    }

    pub fn entries(&self) -> &[ClaimLogEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(from: u64) -> ClaimLogEntry {
        ClaimLogEntry {
            from_pool: PoolId(from),
            ratio: Ray::ZERO,
            amount: 0,
            paying_capital: 0,
            liquidity_index_before_claim: Ray::ZERO,
            timestamp: 0,
        }
    }

    fn claim(amount: u128, paying_capital: u128) -> ClaimLogEntry {
        ClaimLogEntry {
            ratio: Ray::from_ratio(amount, paying_capital).unwrap(),
            amount,
            paying_capital,
            ..entry(0)
        }
    }

    #[test]
    fn test_push_returns_claim_index() {
        let mut log = ClaimLog::new();
        assert_eq!(log.push(entry(0)), 0);
        assert_eq!(log.push(entry(1)), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.get(1).map(|e| e.from_pool), Some(PoolId(1)));
    }

    #[test]
    fn test_since_past_end_is_empty() {
        let mut log = ClaimLog::new();
        log.push(entry(0));
        assert_eq!(log.since(0).len(), 1);
        assert!(log.since(1).is_empty());
        assert!(log.since(10).is_empty());
    }

    #[test]
    fn test_loss_rounds_against_the_position() {
        // a third of one token still costs a whole token
        assert_eq!(claim(1, 3).loss_on(1), 1);
        assert_eq!(claim(182_500, 730_000).loss_on(400_000), 100_000);
        assert_eq!(claim(2, 3).loss_on(3), 2);
    }

    #[test]
    fn test_loss_never_exceeds_capital() {
        assert_eq!(claim(10, 10).loss_on(7), 7);
        assert_eq!(entry(0).loss_on(5), 5);
        assert_eq!(claim(1, 1_000).loss_on(0), 0);
    }
}
