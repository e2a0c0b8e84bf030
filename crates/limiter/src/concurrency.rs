// SPDX-License-Identifier: Apache-2.0

//! Adaptive (AIMD) concurrency limiter capping in-flight sends to one
//! logical target.

use parking_lot::Mutex;

/// Configuration for a [`ConcurrencyLimiter`].
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyLimiterConfig {
    /// Limit used at construction time.
    pub initial_limit: usize,
    /// Floor the limit decays to on repeated failure.
    pub min_limit: usize,
    /// Ceiling the limit grows to on success.
    pub max_limit: usize,
}

impl Default for ConcurrencyLimiterConfig {
    fn default() -> Self {
        Self {
            initial_limit: 8,
            min_limit: 1,
            max_limit: 256,
        }
    }
}

#[derive(Debug)]
struct State {
    current_limit: usize,
    in_sending_count: usize,
}

/// Adaptive-increase-multiplicative-decrease limiter on the number of
/// in-flight requests to one logical target (spec §4.7).
///
/// A sender queue may attach more than one of these (e.g. one per-region and
/// one per-project); a pop is valid only when every attached limiter allows
/// it.
pub struct ConcurrencyLimiter {
    config: ConcurrencyLimiterConfig,
    state: Mutex<State>,
}

impl ConcurrencyLimiter {
    /// Creates a limiter starting at `config.initial_limit`.
    #[must_use]
    pub fn new(config: ConcurrencyLimiterConfig) -> Self {
        Self {
            state: Mutex::new(State {
                current_limit: config.initial_limit,
                in_sending_count: 0,
            }),
            config,
        }
    }

    /// `true` iff a pop would not push `in_sending_count` past the current
    /// limit.
    #[must_use]
    pub fn is_valid_to_pop(&self) -> bool {
        let state = self.state.lock();
        state.in_sending_count < state.current_limit
    }

    /// Called when an item is popped for sending: increments the in-flight
    /// counter. Callers must already have checked [`Self::is_valid_to_pop`].
    pub fn post_pop(&self) {
        self.state.lock().in_sending_count += 1;
    }

    /// Called once a send for a previously popped item has fully completed
    /// (success or terminal failure), decrementing the in-flight counter.
    pub fn on_send_done(&self) {
        let mut state = self.state.lock();
        state.in_sending_count = state.in_sending_count.saturating_sub(1);
    }

    /// Grows the limit by one, up to `max_limit`, on a successful send.
    pub fn on_success(&self) {
        let mut state = self.state.lock();
        state.current_limit = (state.current_limit + 1).min(self.config.max_limit);
    }

    /// Halves the limit, down to `min_limit`, on a failure classified as
    /// server-overload or network error.
    pub fn on_fail(&self) {
        let mut state = self.state.lock();
        state.current_limit = (state.current_limit / 2).max(self.config.min_limit);
    }

    /// Current adaptive limit.
    #[must_use]
    pub fn current_limit(&self) -> usize {
        self.state.lock().current_limit
    }

    /// Current number of in-flight sends.
    #[must_use]
    pub fn in_sending_count(&self) -> usize {
        self.state.lock().in_sending_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(initial: usize, min: usize, max: usize) -> ConcurrencyLimiter {
        ConcurrencyLimiter::new(ConcurrencyLimiterConfig {
            initial_limit: initial,
            min_limit: min,
            max_limit: max,
        })
    }

    #[test]
    fn pop_rejected_once_limit_reached() {
        let limiter = limiter(2, 1, 10);
        assert!(limiter.is_valid_to_pop());
        limiter.post_pop();
        assert!(limiter.is_valid_to_pop());
        limiter.post_pop();
        assert!(!limiter.is_valid_to_pop());
    }

    #[test]
    fn success_grows_limit_up_to_max() {
        let limiter = limiter(2, 1, 3);
        limiter.on_success();
        assert_eq!(limiter.current_limit(), 3);
        limiter.on_success();
        assert_eq!(limiter.current_limit(), 3);
    }

    #[test]
    fn failure_halves_limit_down_to_min() {
        let limiter = limiter(8, 2, 64);
        limiter.on_fail();
        assert_eq!(limiter.current_limit(), 4);
        limiter.on_fail();
        assert_eq!(limiter.current_limit(), 2);
        limiter.on_fail();
        assert_eq!(limiter.current_limit(), 2);
    }

    #[test]
    fn send_done_frees_a_slot() {
        let limiter = limiter(1, 1, 1);
        limiter.post_pop();
        assert!(!limiter.is_valid_to_pop());
        limiter.on_send_done();
        assert!(limiter.is_valid_to_pop());
    }

    proptest::proptest! {
        #[test]
        fn in_sending_count_never_exceeds_current_limit(
            ops in proptest::collection::vec(0..3u8, 1..200)
        ) {
            let limiter = limiter(4, 1, 16);
            for op in ops {
                match op {
                    0 => {
                        if limiter.is_valid_to_pop() {
                            limiter.post_pop();
                        }
                        assert!(limiter.in_sending_count() <= limiter.current_limit());
                    }
                    1 => limiter.on_send_done(),
                    _ => limiter.on_success(),
                }
            }
        }
    }
}
