//! Property tests for the timer-driven hooks.
//!
//! 1. Debounce emits once per quiet gap of at least the delay, carrying the
//!    last value before the gap, plus once at the end.
//! 2. An interval of period `d` has ticked exactly `t / d` times at `t`.
//! 3. Teardown leaves no timer armed.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use proptest::prelude::*;
use tether_hooks::{Debounced, Interval};
use tether_runtime::Timers;

const DELAY_MS: u64 = 300;

proptest! {
    #[test]
    fn burst_inside_window_emits_last_value(
        values in proptest::collection::vec(any::<u16>(), 1..32),
        gaps in proptest::collection::vec(0u64..DELAY_MS, 32),
    ) {
        let timers = Timers::new();
        let hook = Debounced::new(&timers, 0u16, Duration::from_millis(DELAY_MS)).unwrap();
        for (value, gap) in values.iter().zip(&gaps) {
            hook.set(*value);
            timers.advance(Duration::from_millis(*gap));
        }
        prop_assert_eq!(hook.emitted(), 0);
        timers.advance(Duration::from_millis(DELAY_MS));
        prop_assert_eq!(hook.emitted(), 1);
        prop_assert_eq!(hook.value(), *values.last().unwrap());
        prop_assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn emissions_follow_quiet_gaps(steps in proptest::collection::vec((any::<u8>(), 0u64..2 * DELAY_MS), 1..32)) {
        let timers = Timers::new();
        let hook = Debounced::new(&timers, 0u8, Duration::from_millis(DELAY_MS)).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _w = hook.watch(move |v: &u8| sink.borrow_mut().push(*v));

        let mut expected = Vec::new();
        for (value, gap) in &steps {
            hook.set(*value);
            timers.advance(Duration::from_millis(*gap));
            if *gap >= DELAY_MS {
                expected.push(*value);
            }
        }
        timers.advance(Duration::from_millis(DELAY_MS));
        if steps.last().is_some_and(|(_, gap)| *gap < DELAY_MS) {
            expected.push(steps[steps.len() - 1].0);
        }
        prop_assert_eq!(&*seen.borrow(), &expected);
    }

    #[test]
    fn interval_count_is_elapsed_over_period(period in 1u64..500, elapsed in 0u64..5000) {
        let timers = Timers::new();
        let interval = Interval::new(&timers, Some(Duration::from_millis(period))).unwrap();
        timers.advance(Duration::from_millis(elapsed));
        prop_assert_eq!(interval.count(), elapsed / period);

        drop(interval);
        prop_assert_eq!(timers.pending(), 0);
    }
}
