// SPDX-License-Identifier: Apache-2.0

//! Interning registry mapping queue names (`"config_name-flusher_type-target"`)
//! to small opaque integer keys.
//!
//! Keys are compared only for equality; their numeric order carries no
//! meaning. A freed key's name may be reassigned a *new* key on next lookup.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An opaque handle identifying a queue by its interned name.
///
/// Two `QueueKey`s are equal iff they were produced for the same name while
/// neither had been removed from the registry in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueKey(u64);

impl QueueKey {
    #[cfg(test)]
    fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct Tables {
    name_to_key: HashMap<String, QueueKey>,
    key_to_name: HashMap<QueueKey, String>,
}

/// Thread-safe registry interning queue names to [`QueueKey`]s.
///
/// Construct one instance per process and share it (e.g. behind an `Arc`)
/// across every queue manager and flusher that needs to name a queue.
pub struct QueueKeyRegistry {
    tables: Mutex<Tables>,
    next: AtomicUsize,
}

impl Default for QueueKeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueKeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            next: AtomicUsize::new(1),
        }
    }

    /// Returns the key for `name`, assigning a fresh one if `name` is not
    /// currently registered.
    pub fn get_key(&self, name: &str) -> QueueKey {
        let mut tables = self.tables.lock();
        if let Some(key) = tables.name_to_key.get(name) {
            return *key;
        }
        let key = QueueKey(self.next.fetch_add(1, Ordering::Relaxed) as u64);
        let _ = tables.name_to_key.insert(name.to_string(), key);
        let _ = tables.key_to_name.insert(key, name.to_string());
        key
    }

    /// Returns `true` iff `name` currently maps to a key.
    pub fn has_key(&self, name: &str) -> bool {
        self.tables.lock().name_to_key.contains_key(name)
    }

    /// Returns the name registered for `key`, if still present.
    #[must_use]
    pub fn get_name(&self, key: QueueKey) -> Option<String> {
        self.tables.lock().key_to_name.get(&key).cloned()
    }

    /// Removes both directions of the mapping for `key`. A later `get_key`
    /// for the same name assigns a new key.
    pub fn remove_key(&self, key: QueueKey) -> bool {
        let mut tables = self.tables.lock();
        match tables.key_to_name.remove(&key) {
            Some(name) => {
                let _ = tables.name_to_key.remove(&name);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_yields_same_key() {
        let registry = QueueKeyRegistry::new();
        let a = registry.get_key("pipeline-flusher-target");
        let b = registry.get_key("pipeline-flusher-target");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_names_yield_distinct_keys() {
        let registry = QueueKeyRegistry::new();
        let a = registry.get_key("a");
        let b = registry.get_key("b");
        assert_ne!(a, b);
    }

    #[test]
    fn remove_then_reget_yields_fresh_key() {
        let registry = QueueKeyRegistry::new();
        let original = registry.get_key("reused");
        assert!(registry.remove_key(original));
        assert!(!registry.has_key("reused"));
        let fresh = registry.get_key("reused");
        assert_ne!(original.raw(), fresh.raw());
    }

    #[test]
    fn remove_unknown_key_is_false() {
        let registry = QueueKeyRegistry::new();
        let key = registry.get_key("x");
        assert!(registry.remove_key(key));
        assert!(!registry.remove_key(key));
    }

    proptest::proptest! {
        #[test]
        fn injectivity_holds_for_any_name_sequence(names in proptest::collection::vec("[a-z]{1,8}", 1..50)) {
            let registry = QueueKeyRegistry::new();
            let mut seen: HashMap<String, QueueKey> = HashMap::new();
            for name in names {
                let key = registry.get_key(&name);
                match seen.get(&name) {
                    Some(prev) => assert_eq!(*prev, key),
                    None => {
                        for (other_name, other_key) in &seen {
                            if other_name != &name {
                                assert_ne!(*other_key, key);
                            }
                        }
                        let _ = seen.insert(name, key);
                    }
                }
            }
        }
    }
}
