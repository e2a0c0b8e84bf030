// SPDX-License-Identifier: Apache-2.0

//! Per-key pack-id sequence counters and their periodic GC (spec §4.9 step
//! 4: "GC pack-id sequence table"), grounded on the original `PackIdManager`
//! (`examples/original_source/core/plugin/flusher/sls/PackIdManager.cpp`):
//! a key maps to a monotonically increasing sequence number plus the time
//! it was last touched, and entries idle past a timeout are dropped. The
//! serializer that consumes these sequence numbers to build a pack-id
//! suffix is a wire-format concern out of scope here (§13); this module
//! only owns the counter table and its GC.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const SHRINK_THRESHOLD: usize = 100_000;
const SHRINK_TIMEOUT: Duration = Duration::from_secs(86_400);
const NORMAL_TIMEOUT: Duration = Duration::from_secs(86_400 * 30);

struct Entry {
    sequence: u32,
    last_touched: Instant,
}

/// Hands out per-key sequence numbers for pack-id generation and GCs keys
/// that have gone idle, mirroring `PackIdManager::GetAndIncPackSeq` /
/// `CleanTimeoutEntry`.
pub struct PackIdManager {
    entries: Mutex<HashMap<u64, Entry>>,
}

impl Default for PackIdManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PackIdManager {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// Returns the next sequence number for `key`, starting at 0 for a key
    /// seen for the first time, and touches the key's last-used time.
    pub fn next_sequence(&self, key: u64, now: Instant) -> u32 {
        let mut entries = self.entries.lock();
        match entries.get_mut(&key) {
            Some(entry) => {
                let sequence = entry.sequence;
                entry.sequence += 1;
                entry.last_touched = now;
                sequence
            }
            None => {
                entries.insert(key, Entry { sequence: 1, last_touched: now });
                0
            }
        }
    }

    /// Drops every key not touched within its timeout. The timeout shrinks
    /// to one day once the table holds more than 100,000 keys, matching the
    /// original's size-scaled GC window; below that it's 30 days.
    pub fn gc(&self, now: Instant) {
        let mut entries = self.entries.lock();
        let timeout = if entries.len() > SHRINK_THRESHOLD { SHRINK_TIMEOUT } else { NORMAL_TIMEOUT };
        entries.retain(|_, entry| now.duration_since(entry.last_touched) <= timeout);
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the table is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
