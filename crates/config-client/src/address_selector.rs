// SPDX-License-Identifier: Apache-2.0

//! Config-server address selection (spec §4.12 item 2): pick an address per
//! heartbeat, and when the server flags `switch_address`, deterministically
//! avoid re-picking the one just used.

use parking_lot::Mutex;
use rand::Rng;

/// Tracks which address index was last used and rotates away from it on
/// request.
pub struct AddressSelector {
    addresses: Vec<String>,
    current: Mutex<usize>,
}

impl AddressSelector {
    /// Builds a selector starting at index 0. Panics if `addresses` is
    /// empty — callers validate this via [`conduit_config::ConfigServerClientConfig`]
    /// before construction.
    #[must_use]
    pub fn new(addresses: Vec<String>) -> Self {
        assert!(!addresses.is_empty(), "address list must be non-empty");
        Self { addresses, current: Mutex::new(0) }
    }

    /// Returns the currently selected address.
    #[must_use]
    pub fn current(&self) -> &str {
        &self.addresses[*self.current.lock()]
    }

    /// Moves to a different address than the one currently selected. No-op
    /// when only one address is configured.
    pub fn switch(&self) {
        if self.addresses.len() <= 1 {
            return;
        }
        let mut current = self.current.lock();
        let mut next = rand::thread_rng().gen_range(0..self.addresses.len());
        while next == *current {
            next = rand::thread_rng().gen_range(0..self.addresses.len());
        }
        *current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_address_switch_is_a_no_op() {
        let selector = AddressSelector::new(vec!["a".to_string()]);
        selector.switch();
        assert_eq!(selector.current(), "a");
    }

    #[test]
    fn switch_never_repeats_the_same_address() {
        let selector = AddressSelector::new(vec!["a".to_string(), "b".to_string()]);
        let before = selector.current().to_string();
        for _ in 0..20 {
            selector.switch();
            assert_ne!(selector.current(), before);
            // switch back so the next iteration starts from the same state
            selector.switch();
        }
    }

    #[test]
    fn current_starts_at_first_address() {
        let selector = AddressSelector::new(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(selector.current(), "x");
    }
}
