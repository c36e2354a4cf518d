//! Property-based tests over random groups and schedules.
//!
//! Every generated group runs to completion under a seeded schedule and must
//! satisfy all standard oracles.

use pairlock_core::coordinator::PairingPolicy;
use pairlock_harness::scenario::{Scenario, oracle};
use proptest::prelude::*;

fn policy() -> impl Strategy<Value = PairingPolicy> {
    prop_oneof![Just(PairingPolicy::RetryDenied), Just(PairingPolicy::RecordDenied)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_groups_hold_every_invariant(
        (participants, requesters) in (1u32..9).prop_flat_map(|n| (Just(n), 1..=n)),
        cycles in 1u64..5,
        seed in any::<u64>(),
        policy in policy(),
    ) {
        let result = Scenario::new("random group")
            .participants(participants)
            .requesters(requesters)
            .cycles(cycles)
            .policy(policy)
            .seed(seed)
            .oracle(oracle::standard())
            .run();
        prop_assert!(result.is_ok(), "{:?}", result);
    }

    #[test]
    fn random_starting_clocks_keep_priority_order(
        clocks in prop::collection::vec(0u64..20, 4),
        seed in any::<u64>(),
    ) {
        let mut scenario = Scenario::new("random clocks").participants(6).requesters(4).seed(seed);
        for (id, clock) in (0u32..).zip(clocks) {
            scenario = scenario.clock(id, clock);
        }
        let result = scenario
            .setup(|world| (0..4).try_for_each(|id| world.request(id)))
            .oracle(oracle::standard())
            .run();
        prop_assert!(result.is_ok(), "{:?}", result);
    }
}
