//! Integration tests for referral registration and the reward cascade
//!
//! These tests verify cycle rejection, unlink/re-register, the three-level
//! inflow cascade and its round-trip property, and the clamped subtraction
//! that under-credits ancestors in adversarial sequences.

use proptest::prelude::*;
use std::sync::Arc;
use tierstake_core::constants::SECONDS_PER_DAY;
use tierstake_core::{AccountId, LedgerError, ManualClock};
use tierstake_ledger::{LedgerConfig, LedgerEvent, RecordingTransfer, SingleAdmin, StakingEngine};

const DAY: i64 = SECONDS_PER_DAY;

struct Fixture {
    engine: StakingEngine,
    clock: Arc<ManualClock>,
}

fn fixture(config: LedgerConfig) -> Fixture {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let engine = StakingEngine::new(
        config,
        clock.clone(),
        Arc::new(RecordingTransfer::new()),
        Arc::new(SingleAdmin::new(admin())),
    )
    .unwrap();
    Fixture { engine, clock }
}

fn id(label: &str) -> AccountId {
    AccountId::from_label(label)
}

fn admin() -> AccountId {
    id("admin")
}

fn inflow(f: &Fixture, label: &str) -> u128 {
    f.engine.position(&id(label)).daily_referral_inflow_rate
}

/// a <- b <- c
fn chain(f: &Fixture) {
    f.engine.register_referral(id("b"), id("a")).unwrap();
    f.engine.register_referral(id("c"), id("b")).unwrap();
}

mod registration_tests {
    use super::*;

    #[test]
    fn test_cycles_rejected() {
        let f = fixture(LedgerConfig::default());
        f.engine.register_referral(id("b"), id("a")).unwrap();
        assert!(matches!(
            f.engine.register_referral(id("a"), id("b")),
            Err(LedgerError::CircularReference { .. })
        ));

        f.engine.register_referral(id("c"), id("b")).unwrap();
        f.engine.register_referral(id("d"), id("c")).unwrap();
        assert!(matches!(
            f.engine.register_referral(id("a"), id("d")),
            Err(LedgerError::CircularReference { .. })
        ));
        assert!(matches!(
            f.engine.register_referral(id("e"), id("e")),
            Err(LedgerError::CircularReference { .. })
        ));
        assert!(matches!(
            f.engine.register_referral(id("e"), AccountId::ZERO),
            Err(LedgerError::InvalidAccount(_))
        ));
        assert!(matches!(
            f.engine.register_referral(id("b"), id("e")),
            Err(LedgerError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_stake_skips_circular_referrer() {
        let f = fixture(LedgerConfig::default());
        chain(&f);
        f.engine.stake(id("a"), 1_000, Some(id("c"))).unwrap();
        assert_eq!(f.engine.referral_node(&id("a")).parent, None);
        assert_eq!(f.engine.position(&id("a")).principal, 1_000);
    }

    #[test]
    fn test_unlink_then_register_elsewhere() {
        let f = fixture(LedgerConfig::default());
        chain(&f);

        assert!(matches!(
            f.engine.unlink(&id("mallory"), id("b")),
            Err(LedgerError::Unauthorized { .. })
        ));
        assert_eq!(f.engine.unlink(&admin(), id("b")).unwrap(), id("a"));
        f.engine.register_referral(id("b"), id("x")).unwrap();

        assert!(f.engine.referral_node(&id("a")).children.is_empty());
        let x = f.engine.referral_node(&id("x"));
        assert_eq!(x.children.iter().copied().collect::<Vec<_>>(), vec![id("b")]);
        assert_eq!(f.engine.referral_node(&id("b")).parent, Some(id("x")));
        // grandchild stays with b
        assert_eq!(f.engine.referral_node(&id("c")).parent, Some(id("b")));

        assert!(matches!(
            f.engine.unlink(&admin(), id("a")),
            Err(LedgerError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_unlink_reorders_siblings() {
        let f = fixture(LedgerConfig::default());
        for child in ["c1", "c2", "c3", "c4"] {
            f.engine.register_referral(id(child), id("p")).unwrap();
        }
        f.engine.unlink(&admin(), id("c2")).unwrap();
        let children: Vec<_> = f.engine.referral_node(&id("p")).children.iter().copied().collect();
        assert_eq!(children, vec![id("c1"), id("c4"), id("c3")]);
    }

    #[test]
    fn test_active_referee_count() {
        let f = fixture(LedgerConfig::default());
        f.engine.stake(id("c1"), 3_000_000, Some(id("p"))).unwrap();
        f.engine.register_referral(id("c2"), id("p")).unwrap();
        assert_eq!(f.engine.active_referee_count(&id("p")), 1);

        f.clock.advance_days(90);
        f.engine.claim(id("c1"), 3_000_000).unwrap();
        assert_eq!(f.engine.active_referee_count(&id("p")), 0);
    }

    #[test]
    fn test_registering_staked_account_moves_no_inflow() {
        let f = fixture(LedgerConfig::default());
        let p = id("p");
        f.engine.stake(id("c1"), 3_000_000, Some(p)).unwrap();
        f.engine.stake(id("x"), 3_000_000, None).unwrap();
        assert_eq!(inflow(&f, "p"), 800);

        // x joins p after staking: p is not credited for x
        f.engine.register_referral(id("x"), p).unwrap();
        assert_eq!(inflow(&f, "p"), 800);

        // x's exit removes 800 that p never received, wiping c1's share
        f.clock.advance_days(90);
        f.engine.claim(id("x"), 3_000_000).unwrap();
        assert_eq!(inflow(&f, "p"), 0);
        assert_eq!(f.engine.position(&id("c1")).principal, 3_000_000);
    }

    #[test]
    fn test_registration_events() {
        let f = fixture(LedgerConfig::default());
        f.engine.stake(id("b"), 3_000_000, Some(id("a"))).unwrap();
        let events = f.engine.drain_events();
        assert_eq!(
            events[0],
            LedgerEvent::ReferralRegistered {
                account: id("b"),
                referrer: id("a")
            }
        );
        assert_eq!(
            events[1],
            LedgerEvent::ReferralRateChanged {
                account: id("a"),
                level: 1,
                daily_inflow: 800
            }
        );
        assert!(matches!(events[2], LedgerEvent::Staked { .. }));
        assert!(f.engine.drain_events().is_empty());
    }
}

mod cascade_tests {
    use super::*;

    #[test]
    fn test_three_level_cascade_round_trip() {
        let f = fixture(LedgerConfig::default());
        chain(&f);

        // d's daily reward is 8,000
        f.engine.stake(id("d"), 3_000_000, Some(id("c"))).unwrap();
        assert_eq!(inflow(&f, "c"), 800);
        assert_eq!(inflow(&f, "b"), 400);
        assert_eq!(inflow(&f, "a"), 200);

        f.clock.advance_days(10);
        assert_eq!(f.engine.preview_referral_reward(&id("c")), 8_000);
        assert_eq!(f.engine.preview_referral_reward(&id("b")), 4_000);
        assert_eq!(f.engine.preview_referral_reward(&id("a")), 2_000);
        assert_eq!(f.engine.claim_referral_reward(id("c"), 8_000).unwrap(), 8_000);

        f.clock.advance_days(80);
        f.engine.claim(id("d"), 3_000_000).unwrap();
        for ancestor in ["a", "b", "c"] {
            assert_eq!(inflow(&f, ancestor), 0);
        }
        // accrual up to the unstake was banked
        assert_eq!(f.engine.position(&id("a")).pending_referral_reward, 18_000);
    }

    #[test]
    fn test_referral_accrues_per_second() {
        let f = fixture(LedgerConfig::default());
        f.engine.stake(id("b"), 3_000_000, Some(id("a"))).unwrap();
        // 800 per day
        f.clock.advance(DAY / 4);
        assert_eq!(f.engine.preview_referral_reward(&id("a")), 200);
    }

    #[test]
    fn test_level_depth_from_config() {
        let config = LedgerConfig {
            level_rates_bps: vec![2000, 1000],
            ..Default::default()
        };
        let f = fixture(config);
        chain(&f);
        f.engine.stake(id("d"), 3_000_000, Some(id("c"))).unwrap();
        assert_eq!(inflow(&f, "c"), 1_600);
        assert_eq!(inflow(&f, "b"), 800);
        assert_eq!(inflow(&f, "a"), 0);
    }

    #[test]
    fn test_unlink_keeps_propagated_inflow() {
        let f = fixture(LedgerConfig::default());
        f.engine.stake(id("b"), 3_000_000, Some(id("a"))).unwrap();
        f.engine.unlink(&admin(), id("b")).unwrap();
        assert_eq!(inflow(&f, "a"), 800);
    }

    #[test]
    fn test_clamp_under_credits_ancestor() {
        let f = fixture(LedgerConfig::default());
        let b = id("b");

        // c1: 3,000,000 at 8% -> 8,000/day -> b +800
        f.engine.stake(id("c1"), 3_000_000, Some(b)).unwrap();
        assert_eq!(inflow(&f, "b"), 800);

        // c2 stakes unreferred: 6,000,000 at 10% -> 20,000/day, b gets nothing
        f.engine.stake(id("c2"), 6_000_000, None).unwrap();
        assert_eq!(inflow(&f, "b"), 800);

        // c2 joins b on a top-up: 7,000,000 at 10% -> 23,333/day
        // b: 800 + 2,333 - min(2,000, 3,133) = 1,133
        f.engine.stake(id("c2"), 1_000_000, Some(b)).unwrap();
        assert_eq!(inflow(&f, "b"), 1_133);

        // c2 exits: 1,133 - min(2,333, 1,133) = 0, c1's 800 is lost
        f.clock.advance_days(120);
        f.engine.claim(id("c2"), 7_000_000).unwrap();
        assert_eq!(inflow(&f, "b"), 0);
        assert_eq!(f.engine.position(&id("c1")).principal, 3_000_000);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_cascade_round_trip(
            existing in 1u128..200_000_000,
            stake in 1u128..200_000_000,
        ) {
            let f = fixture(LedgerConfig::default());
            chain(&f);
            f.engine.stake(id("e"), existing, Some(id("c"))).unwrap();
            let before: Vec<u128> = ["a", "b", "c"].iter().map(|l| inflow(&f, l)).collect();

            f.engine.stake(id("d"), stake, Some(id("c"))).unwrap();
            f.clock.advance_days(270);
            f.engine.claim(id("d"), stake).unwrap();

            let after: Vec<u128> = ["a", "b", "c"].iter().map(|l| inflow(&f, l)).collect();
            prop_assert_eq!(before, after);
        }
    }
}
