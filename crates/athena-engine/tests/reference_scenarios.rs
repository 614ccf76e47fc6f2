//! End-to-end scenarios through the registry

use athena_common::{AthenaError, PoolId, Ray};
use athena_engine::{CoverUpdate, PremiumCurve, Registry};

const DAY: u64 = 86_400;

fn pool_with_liquidity(registry: &mut Registry, capital: u128) -> PoolId {
    let pool = registry.create_pool(PremiumCurve::default(), &[], 0).unwrap();
    registry.deposit([pool], capital, 0).unwrap();
    pool
}

#[test]
fn cover_of_109_500_lasts_730_ticks() {
    let mut registry = Registry::default();
    let pool = pool_with_liquidity(&mut registry, 730_000);

    let receipt = registry.open_cover(pool, 109_500, 2_190, 0).unwrap();
    assert_eq!(receipt.premium_rate, Ray::from_int(2));
    assert_eq!(receipt.duration_ticks, 730);

    // 730 ticks of 12 hours
    let expired = registry.actualize(pool, 365 * DAY).unwrap();
    assert_eq!(expired, vec![receipt.cover_id]);

    let state = registry.pool_state(pool).unwrap();
    assert_eq!(state.tick, 730);
    assert_eq!(state.total_insured_capital, 0);
    assert_eq!(state.cumulative_premium_spent, Ray::from_int(2_190));
}

#[test]
fn closing_before_expiry_removes_the_scheduled_expiry() {
    let mut registry = Registry::default();
    let pool = pool_with_liquidity(&mut registry, 730_000);
    let receipt = registry.open_cover(pool, 109_500, 2_190, 0).unwrap();

    let closure = registry.close_cover(receipt.cover_id, 10 * DAY).unwrap();
    assert_eq!(closure.released_premium, 2_190 - 20 * 3);
    assert!(registry.pool(pool).unwrap().expiries.is_empty());

    // the cover never fires later
    let expired = registry.actualize(pool, 400 * DAY).unwrap();
    assert!(expired.is_empty());
    assert_eq!(
        registry.update_cover(receipt.cover_id, CoverUpdate { add_premium: 10, ..Default::default() }, 400 * DAY),
        Err(AthenaError::CoverIsClosed(receipt.cover_id))
    );
}

#[test]
fn single_lp_reward_matches_daily_emission() {
    let mut registry = Registry::default();
    let pool = registry.create_pool(PremiumCurve::default(), &[], 0).unwrap();
    let position = registry.deposit([pool], 730_000, 0).unwrap();
    registry.open_cover(pool, 219_000, 219_000, 0).unwrap();

    let state = registry.preview_pool(pool, DAY).unwrap();
    assert_eq!(state.premium_rate, Ray::from_int(3));
    assert_eq!(state.emission_rate, Ray::from_int(18));

    let settlement = registry.take_interest(position, DAY).unwrap();
    assert_eq!(settlement.rewards, 18);

    // settling twice at the same time yields nothing new
    let again = registry.take_interest(position, DAY).unwrap();
    assert_eq!(again.rewards, 0);
    assert_eq!(again.capital, settlement.capital);
}

#[test]
fn claim_ratio_propagates_to_overlapping_pools() {
    let mut registry = Registry::default();
    let a = registry.create_pool(PremiumCurve::default(), &[], 0).unwrap();
    let b = registry.create_pool(PremiumCurve::default(), &[], 0).unwrap();
    let c = registry.create_pool(PremiumCurve::default(), &[], 0).unwrap();

    let both = registry.deposit([a, b], 400_000, 0).unwrap();
    let only_a = registry.deposit([a], 330_000, 0).unwrap();
    let only_c = registry.deposit([c], 100_000, 0).unwrap();

    let receipt = registry.record_claim(a, 182_500, DAY).unwrap();
    assert_eq!(receipt.ratio.raw(), Ray::from_ratio(1, 4).unwrap().raw());
    assert_eq!(receipt.ratio.to_string(), "0.25");

    assert_eq!(registry.pool_state(a).unwrap().available_capital, 547_500);
    assert_eq!(registry.pool_state(b).unwrap().available_capital, 300_000);
    assert_eq!(registry.pool_state(c).unwrap().available_capital, 100_000);
    assert_eq!(registry.claim_log(a).unwrap().len(), 1);
    assert_eq!(registry.claim_log(b).unwrap().len(), 1);
    assert!(registry.claim_log(c).unwrap().is_empty());

    assert_eq!(registry.take_interest(both, DAY).unwrap().capital, 300_000);
    assert_eq!(registry.take_interest(only_a, DAY).unwrap().capital, 247_500);
    assert_eq!(registry.take_interest(only_c, DAY).unwrap().capital, 100_000);
}

#[test]
fn claim_splits_rewards_at_the_claim_time() {
    let mut registry = Registry::default();
    let pool = registry.create_pool(PremiumCurve::default(), &[], 0).unwrap();
    let position = registry.deposit([pool], 730_000, 0).unwrap();
    registry.open_cover(pool, 219_000, 219_000, 0).unwrap();

    registry.record_claim(pool, 182_500, DAY).unwrap();
    let settlement = registry.take_interest(position, 2 * DAY).unwrap();

    // 18 before the claim, then 18 more on the remaining capital
    assert_eq!(settlement.capital, 547_500);
    assert_eq!(settlement.rewards, 36);
    assert_eq!(settlement.claims_applied, 1);
}

#[test]
fn incompatible_pools_cannot_share_a_deposit() {
    let mut registry = Registry::default();
    let a = registry.create_pool(PremiumCurve::default(), &[], 0).unwrap();
    let b = registry.create_pool(PremiumCurve::default(), &[a], 0).unwrap();

    assert_eq!(
        registry.deposit([b, a], 1_000, 0),
        Err(AthenaError::IncompatiblePools { pool: a, other: b })
    );
    assert_eq!(registry.pool_state(a).unwrap().available_capital, 0);
}

#[test]
fn over_utilized_pool_recovers_as_covers_expire() {
    let mut registry = Registry::default();
    let pool = pool_with_liquidity(&mut registry, 1_000);
    registry.open_cover(pool, 900, 1_000, 0).unwrap();

    registry.record_claim(pool, 500, DAY).unwrap();
    let state = registry.pool_state(pool).unwrap();
    assert!(state.is_over_utilized());
    assert_eq!(state.available_capacity(), 0);
    assert_eq!(
        registry.open_cover(pool, 1, 1_000, DAY),
        Err(AthenaError::InsufficientCapacity {
            pool,
            requested: 1,
            available: 0
        })
    );
}
