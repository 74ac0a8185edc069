//! Randomized checks of the ledger's balance and tier invariants over long
//! earn/spend/redeem sequences.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use storefront_cache::LocalStore;
use storefront_core::config::LoyaltyConfig;
use storefront_core::loyalty::{LoyaltyTier, TierStanding};
use storefront_loyalty::LoyaltyLedger;

fn open_ledger() -> LoyaltyLedger {
    LoyaltyLedger::open(&LoyaltyConfig::default(), Arc::new(LocalStore::new()))
        .expect("empty store opens")
}

#[test]
fn lifetime_points_equal_sum_of_earnings() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut ledger = open_ledger();
    let mut earned = 0u64;

    for i in 0..200 {
        let points = rng.gen_range(1..=750);
        earned += points;
        ledger.add_points("shopper", points, &format!("order {i}"), None);

        // Interleaved spends must never move lifetime points.
        if rng.gen_bool(0.3) {
            let spend = rng.gen_range(1..=1_000);
            ledger.spend_points("shopper", spend, "spend", None);
        }
    }

    let user = ledger.user("shopper").expect("user exists");
    assert_eq!(user.lifetime_points, earned);
    assert_eq!(user.total_points, earned);
}

#[test]
fn spend_moves_only_available_points() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut ledger = open_ledger();
    ledger.add_points("shopper", 20_000, "bulk", None);

    for _ in 0..300 {
        let before = ledger.user("shopper").expect("user exists").clone();
        let spend = rng.gen_range(0..=1_500);
        let ok = ledger.spend_points("shopper", spend, "spend", None);
        let after = ledger.user("shopper").expect("user exists");

        if spend > before.available_points {
            assert!(!ok);
            assert_eq!(after, &before);
        } else {
            assert!(ok);
            assert_eq!(after.available_points, before.available_points - spend);
        }
        assert_eq!(after.total_points, before.total_points);
        assert_eq!(after.lifetime_points, before.lifetime_points);
        assert_eq!(after.tier, before.tier);
    }
}

#[test]
fn tier_depends_only_on_lifetime_points() {
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..50 {
        let mut amounts: Vec<u64> = (0..rng.gen_range(1..12))
            .map(|_| rng.gen_range(1..=4_000))
            .collect();

        let mut forward = open_ledger();
        for a in &amounts {
            forward.add_points("a", *a, "earn", None);
        }

        amounts.reverse();
        let mut backward = open_ledger();
        for a in &amounts {
            backward.add_points("a", *a, "earn", None);
        }

        let f = forward.user("a").expect("user exists");
        let b = backward.user("a").expect("user exists");
        let expected = TierStanding::for_lifetime_points(f.lifetime_points);

        assert_eq!(f.tier, b.tier);
        assert_eq!(f.tier, expected.tier);
        assert_eq!(f.next_tier_threshold, expected.next_threshold);
        assert!((0.0..=100.0).contains(&f.tier_progress));
        if f.tier == LoyaltyTier::Platinum {
            assert_eq!(f.tier_progress, 100.0);
        }
    }
}

#[test]
fn tier_never_regresses() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut ledger = open_ledger();
    let mut highest = LoyaltyTier::Bronze;

    for _ in 0..150 {
        if rng.gen_bool(0.5) {
            ledger.add_points("shopper", rng.gen_range(1..=500), "earn", None);
        } else {
            let reward = format!("reward_{}", rng.gen_range(1..=6));
            ledger.redeem_reward("shopper", &reward);
        }

        if let Some(user) = ledger.user("shopper") {
            assert!(user.tier >= highest);
            highest = user.tier;
        }
    }
}

#[test]
fn available_rewards_are_affordable() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut ledger = open_ledger();

    for _ in 0..100 {
        ledger.add_points("shopper", rng.gen_range(1..=400), "earn", None);
        if rng.gen_bool(0.4) {
            let reward = format!("reward_{}", rng.gen_range(1..=5));
            ledger.redeem_reward("shopper", &reward);
        }

        let available = ledger
            .user("shopper")
            .expect("user exists")
            .available_points;
        for reward in ledger.get_available_rewards("shopper") {
            assert!(reward.points_cost <= available);
            assert!(reward.is_active);
        }
    }
}

#[test]
fn global_log_matches_user_history() {
    let mut ledger = open_ledger();
    ledger.add_points("a", 600, "earn", None);
    ledger.add_points("b", 300, "earn", None);
    assert!(ledger.redeem_reward("a", "reward_1"));
    assert!(!ledger.redeem_reward("b", "reward_1"));

    let a = ledger.get_user_transactions("a");
    let b = ledger.get_user_transactions("b");
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 1);
    assert_eq!(ledger.all_transactions().len(), a.len() + b.len());

    let net: i64 = a.iter().map(|t| t.points).sum();
    assert_eq!(net, 100);
}
