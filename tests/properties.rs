mod common;

use circuitbreaker_retry::{CircuitBreaker, OverflowPolicy, State};
use common::TestError;
use proptest::prelude::*;
use std::time::Duration;

fn any_state() -> impl Strategy<Value = State> {
    prop_oneof![Just(State::Closed), Just(State::HalfOpen), Just(State::Open)]
}

fn any_overflow() -> impl Strategy<Value = OverflowPolicy> {
    prop_oneof![
        Just(OverflowPolicy::DropOldest),
        Just(OverflowPolicy::RejectNew)
    ]
}

proptest! {
    #[test]
    fn failure_only_moves_along_valid_edges(
        state in any_state(),
        logged in 1usize..32,
        max_failures in 2usize..16,
    ) {
        let next = state.next_on_failure(logged, max_failures);
        prop_assert!(next == state || state.can_transition_to(next));
        prop_assert_ne!(next, State::Closed);
        if state == State::HalfOpen {
            prop_assert_eq!(next == State::Open, logged > max_failures);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn bounded_queue_never_exceeds_capacity(
        capacity in 0usize..12,
        max_failures in 0usize..6,
        overflow in any_overflow(),
        outcomes in prop::collection::vec(any::<bool>(), 1..48),
    ) {
        let breaker = CircuitBreaker::<TestError>::builder()
            .max_failures(max_failures)
            .timeout(Duration::from_secs(30))
            .max_queue_capacity(capacity)
            .overflow_policy(overflow)
            .build()
            .unwrap();
        let bound = capacity.max(3).max(breaker.max_failures());

        for ok in outcomes {
            let _ = breaker.call(move || {
                if ok { Ok(()) } else { Err(TestError::new("fail")) }
            });
            prop_assert!(breaker.queued() <= bound);
        }

        let stats = breaker.stats();
        prop_assert_eq!(
            breaker.queued() as u64,
            stats.failures + stats.rejections - stats.dropped
        );
        prop_assert_eq!(
            breaker.logged_errors() as u64 + stats.flushed_errors,
            stats.failures
        );
    }
}
