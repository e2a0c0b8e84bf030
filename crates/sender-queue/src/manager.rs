// SPDX-License-Identifier: Apache-2.0

//! Registry of per-destination sender queues, with the combined
//! `get_all_available_items` the flusher runner drains each tick.

use crate::item::SenderQueueItem;
use crate::sender_queue_ops::SenderQueueOps;
use conduit_queue::{QueueOutcome, Trigger};
use conduit_queue_key::QueueKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    queue: Arc<dyn SenderQueueOps>,
    marked_deleted: bool,
    deleted_at: Option<Instant>,
}

/// Registry + fan-in + GC for per-destination sender queues.
pub struct SenderQueueManager {
    queues: Mutex<HashMap<QueueKey, Entry>>,
    trigger: Trigger,
}

impl Default for SenderQueueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SenderQueueManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            trigger: Trigger::new(),
        }
    }

    /// Registers a new queue, or replaces an existing one under `key`.
    pub fn create_or_update(&self, key: QueueKey, queue: Arc<dyn SenderQueueOps>) {
        let _ = self.queues.lock().insert(
            key,
            Entry {
                queue,
                marked_deleted: false,
                deleted_at: None,
            },
        );
        self.trigger.fire();
    }

    /// Marks `key` for deletion; actual removal is deferred to
    /// [`SenderQueueManager::gc_sweep`].
    pub fn delete(&self, key: QueueKey) {
        if let Some(entry) = self.queues.lock().get_mut(&key) {
            entry.marked_deleted = true;
        }
    }

    /// Pushes `item` onto the queue named by `key`.
    pub fn push(&self, key: QueueKey, item: Arc<SenderQueueItem>) -> QueueOutcome {
        let outcome = {
            let queues = self.queues.lock();
            match queues.get(&key) {
                Some(entry) if !entry.marked_deleted => entry.queue.push(item),
                _ => QueueOutcome::NotFound,
            }
        };
        if outcome == QueueOutcome::Ok {
            self.trigger.fire();
        }
        outcome
    }

    /// `true` iff `key` resolves to a currently push-valid queue.
    #[must_use]
    pub fn is_valid_to_push(&self, key: QueueKey) -> bool {
        self.queues
            .lock()
            .get(&key)
            .map(|e| !e.marked_deleted && e.queue.is_valid_to_push())
            .unwrap_or(false)
    }

    /// Drains up to `limit_per_queue` ready items from every registered
    /// queue, honoring each queue's own limiter protocol when
    /// `honor_limits` is `true` (set `false` during a full-drain shutdown).
    #[must_use]
    pub fn get_all_available_items(&self, limit_per_queue: usize) -> Vec<(QueueKey, Arc<SenderQueueItem>)> {
        let queues = self.queues.lock();
        let mut out = Vec::new();
        for (key, entry) in queues.iter() {
            for item in entry.queue.get_available_items(limit_per_queue) {
                out.push((*key, item));
            }
        }
        out
    }

    /// Removes `item` from the queue named by `key`.
    pub fn remove(&self, key: QueueKey, item: &Arc<SenderQueueItem>) -> bool {
        let removed = self
            .queues
            .lock()
            .get(&key)
            .map(|e| e.queue.remove(item))
            .unwrap_or(false);
        if removed {
            self.trigger.fire();
        }
        removed
    }

    /// Blocks until a push or creation fires the trigger, or `timeout`
    /// elapses.
    pub fn wait(&self, timeout: Duration) {
        self.trigger.wait(timeout);
    }

    /// Removes queues marked for deletion once they are drained and have
    /// stayed that way for at least `grace`.
    pub fn gc_sweep(&self, grace: Duration) {
        let now = Instant::now();
        let mut queues = self.queues.lock();
        let mut to_remove = Vec::new();
        for (key, entry) in queues.iter_mut() {
            if !entry.marked_deleted {
                continue;
            }
            if !entry.queue.is_empty() {
                entry.deleted_at = None;
                continue;
            }
            match entry.deleted_at {
                None => entry.deleted_at = Some(now),
                Some(at) if now.duration_since(at) >= grace => to_remove.push(*key),
                Some(_) => {}
            }
        }
        for key in to_remove {
            let _ = queues.remove(&key);
        }
    }
}
