// SPDX-License-Identifier: Apache-2.0

//! Rolling one-second byte-rate limiter for a single sender queue.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

fn wall_clock_second() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

struct State {
    last_second_start: u64,
    last_second_total_bytes: u64,
}

/// Caps bytes sent per wall-clock second for one sender queue (spec §4.8).
///
/// The window rolls forward (resetting the byte counter) whenever the
/// current wall-clock second advances past `last_second_start`; it does not
/// attempt sub-second smoothing.
pub struct RateLimiter {
    max_bytes_per_second: u64,
    state: Mutex<State>,
    now_fn: fn() -> u64,
}

impl RateLimiter {
    /// Creates a limiter capping throughput at `max_bytes_per_second`.
    #[must_use]
    pub fn new(max_bytes_per_second: u64) -> Self {
        Self::with_clock(max_bytes_per_second, wall_clock_second)
    }

    /// Test hook: inject a deterministic clock function instead of the wall
    /// clock.
    #[must_use]
    pub fn with_clock(max_bytes_per_second: u64, now_fn: fn() -> u64) -> Self {
        Self {
            max_bytes_per_second,
            state: Mutex::new(State {
                last_second_start: now_fn(),
                last_second_total_bytes: 0,
            }),
            now_fn,
        }
    }

    fn roll_if_needed(&self, state: &mut State) {
        let now = (self.now_fn)();
        if now != state.last_second_start {
            state.last_second_start = now;
            state.last_second_total_bytes = 0;
        }
    }

    /// `true` iff the rolling window has not yet reached the byte budget.
    /// Matches spec's "admit the last crossing item": a pop that would push
    /// the bucket over budget is still allowed if the bucket was under
    /// budget *before* this check (the over-budget state only blocks the
    /// *next* pop).
    pub fn is_valid_to_pop(&self) -> bool {
        let mut state = self.state.lock();
        self.roll_if_needed(&mut state);
        state.last_second_total_bytes < self.max_bytes_per_second
    }

    /// Records `size` bytes as sent in the current window.
    pub fn post_pop(&self, size: u64) {
        let mut state = self.state.lock();
        self.roll_if_needed(&mut state);
        state.last_second_total_bytes += size;
    }

    /// Bytes already accounted for in the current rolling window.
    #[must_use]
    pub fn current_window_bytes(&self) -> u64 {
        let mut state = self.state.lock();
        self.roll_if_needed(&mut state);
        state.last_second_total_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static FAKE_CLOCK: AtomicU64 = AtomicU64::new(0);

    fn fake_now() -> u64 {
        FAKE_CLOCK.load(Ordering::SeqCst)
    }

    fn set_fake_clock(value: u64) {
        FAKE_CLOCK.store(value, Ordering::SeqCst);
    }

    #[test]
    fn pop_rejected_once_budget_reached() {
        set_fake_clock(100);
        let limiter = RateLimiter::with_clock(1000, fake_now);
        assert!(limiter.is_valid_to_pop());
        limiter.post_pop(1000);
        assert!(!limiter.is_valid_to_pop());
    }

    #[test]
    fn window_rolls_over_on_new_second() {
        set_fake_clock(100);
        let limiter = RateLimiter::with_clock(1000, fake_now);
        limiter.post_pop(1000);
        assert!(!limiter.is_valid_to_pop());
        set_fake_clock(101);
        assert!(limiter.is_valid_to_pop());
        assert_eq!(limiter.current_window_bytes(), 0);
    }

    proptest::proptest! {
        #[test]
        fn total_popped_bytes_per_second_bounded_by_budget_plus_one_item(
            sizes in proptest::collection::vec(1u64..500, 1..100)
        ) {
            set_fake_clock(0);
            let limiter = RateLimiter::with_clock(1000, fake_now);
            let mut admitted_in_window = 0u64;
            for size in sizes {
                if limiter.is_valid_to_pop() {
                    limiter.post_pop(size);
                    admitted_in_window += size;
                    assert!(admitted_in_window <= 1000 + 500);
                } else {
                    admitted_in_window = 0;
                    set_fake_clock(fake_now() + 1);
                }
            }
        }
    }
}
