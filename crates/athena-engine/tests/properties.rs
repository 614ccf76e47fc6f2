//! Property tests over random operation sequences

use athena_common::{PoolId, Ray};
use athena_engine::{PremiumCurve, Registry};
use proptest::prelude::*;

const DAY: u64 = 86_400;

fn funded_registry(capital: u128) -> (Registry, PoolId) {
    let mut registry = Registry::default();
    let pool = registry.create_pool(PremiumCurve::default(), &[], 0).unwrap();
    registry.deposit([pool], capital, 0).unwrap();
    (registry, pool)
}

proptest! {
    #[test]
    fn tick_is_monotonic_and_clock_follows_targets(
        covers in prop::collection::vec((1_000u128..100_000, 10u128..20_000), 1..5),
        steps in prop::collection::vec(0u64..5 * DAY, 1..20),
    ) {
        let (mut registry, pool) = funded_registry(1_000_000);
        for (capital, premium) in &covers {
            let _ = registry.open_cover(pool, *capital, *premium, 0);
        }

        let mut now = 0;
        let mut last_tick = 0;
        for step in steps {
            now += step;
            registry.actualize(pool, now).unwrap();
            let state = registry.pool_state(pool).unwrap();
            prop_assert!(state.tick >= last_tick);
            prop_assert_eq!(state.last_update_timestamp, now);
            last_tick = state.tick;
        }
    }

    #[test]
    fn preview_equals_actualize(
        covers in prop::collection::vec((1_000u128..100_000, 10u128..20_000, 0u64..DAY), 1..6),
        target in 0u64..30 * DAY,
    ) {
        let (mut registry, pool) = funded_registry(2_000_000);
        let mut now = 0;
        for (capital, premium, gap) in &covers {
            now += gap;
            let _ = registry.open_cover(pool, *capital, *premium, now);
        }
        let target = now + target;

        let previewed = registry.preview_pool(pool, target).unwrap();
        registry.actualize(pool, target).unwrap();
        prop_assert_eq!(&previewed, registry.pool_state(pool).unwrap());
    }

    #[test]
    fn premium_is_conserved_once_every_cover_expired(
        covers in prop::collection::vec((1_000u128..100_000, 10u128..5_000), 1..6),
    ) {
        let (mut registry, pool) = funded_registry(1_000_000);
        let mut deposited = 0u128;
        for (capital, premium) in &covers {
            if registry.open_cover(pool, *capital, *premium, 0).is_ok() {
                deposited += premium;
            }
        }

        registry.actualize(pool, 400_000 * DAY).unwrap();
        let state = registry.pool_state(pool).unwrap();
        prop_assert_eq!(state.remaining_covers, 0);
        prop_assert_eq!(state.premium_per_tick, Ray::ZERO);
        prop_assert_eq!(state.cumulative_premium_spent, Ray::from_int(deposited));
    }

    #[test]
    fn available_capital_matches_settled_positions(
        deposits in prop::collection::vec((10_000u128..1_000_000, 1u8..8), 1..6),
        claims in prop::collection::vec((0usize..3, 1u128..50), 0..5),
    ) {
        let mut registry = Registry::default();
        let pools: Vec<PoolId> = (0..3)
            .map(|_| registry.create_pool(PremiumCurve::default(), &[], 0).unwrap())
            .collect();
        let mut positions = Vec::new();
        for (amount, mask) in &deposits {
            let backed: Vec<PoolId> = (0..3).filter(|i| mask & (1 << i) != 0).map(|i| pools[i]).collect();
            positions.push(registry.deposit(backed, *amount, 0).unwrap());
        }

        let mut now = 0;
        for (paying, percent) in &claims {
            now += DAY;
            let available = registry.pool_state(pools[*paying]).unwrap().available_capital;
            let _ = registry.record_claim(pools[*paying], available * percent / 100, now);
        }

        let tolerance = 2 * positions.len() as u128 * (claims.len() as u128 + 1);
        for pool in &pools {
            let settled: u128 = positions
                .iter()
                .map(|position| registry.rewards_of(*position, now).unwrap())
                .filter(|settlement| {
                    registry.position(settlement.position).unwrap().pool_ids.contains(pool)
                })
                .map(|settlement| settlement.capital)
                .sum();
            let available = registry.pool_state(*pool).unwrap().available_capital;
            prop_assert!(settled <= available, "settled {} over available {}", settled, available);
            prop_assert!(available - settled <= tolerance,
                "settled {} vs available {}", settled, available);
        }

        for position in positions {
            let capital = registry.rewards_of(position, now).unwrap().capital;
            if capital == 0 {
                registry.take_interest(position, now).unwrap();
            } else {
                let withdrawal = registry.withdraw(position, capital, now);
                prop_assert!(withdrawal.is_ok(), "withdrawing {} failed: {:?}", capital, withdrawal);
            }
            prop_assert!(registry.position(position).is_err());
        }
    }
}
