// SPDX-License-Identifier: Apache-2.0

//! Registry of process queues with priority-indexed round-robin iteration
//! and deferred GC of marked-deleted queues (spec §4.6).

use crate::process_queue_ops::ProcessQueueOps;
use crate::push_gate::QueueOutcome;
use crate::trigger::Trigger;
use conduit_queue_key::{QueueKey, QueueKeyRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of fair-share priority levels (spec §4.6: priorities 0 through 3).
pub const PRIORITY_LEVELS: usize = 4;

struct Entry<T> {
    queue: Arc<dyn ProcessQueueOps<T>>,
    priority: u8,
    /// `Some(n)` pins this queue to processing thread `n` (used to keep a
    /// given exactly-once pipeline's events on one thread, spec §4.6).
    pinned_thread: Option<usize>,
    marked_deleted: bool,
    deleted_at: Option<Instant>,
}

struct ManagerState<T> {
    queues: HashMap<QueueKey, Entry<T>>,
    /// Registration order of keys per priority level, used as the
    /// round-robin ring for that level.
    priorities: [Vec<QueueKey>; PRIORITY_LEVELS],
    /// Round-robin cursor per `(thread_no, priority)`, indexing into
    /// `priorities[priority]`.
    cursors: HashMap<(usize, u8), usize>,
}

impl<T> Default for ManagerState<T> {
    fn default() -> Self {
        Self {
            queues: HashMap::new(),
            priorities: Default::default(),
            cursors: HashMap::new(),
        }
    }
}

/// Registry + fair-iteration + GC for per-pipeline process queues.
pub struct ProcessQueueManager<T> {
    registry: Arc<QueueKeyRegistry>,
    state: Mutex<ManagerState<T>>,
    trigger: Trigger,
}

impl<T> ProcessQueueManager<T> {
    /// Creates an empty manager sharing `registry` with the rest of the
    /// process.
    #[must_use]
    pub fn new(registry: Arc<QueueKeyRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(ManagerState::default()),
            trigger: Trigger::new(),
        }
    }

    /// Registers a new queue under `key`, or replaces the queue/priority of
    /// an existing one (e.g. on pipeline reload).
    pub fn create_or_update(
        &self,
        key: QueueKey,
        queue: Arc<dyn ProcessQueueOps<T>>,
        priority: u8,
        pinned_thread: Option<usize>,
    ) {
        assert!((priority as usize) < PRIORITY_LEVELS);
        let mut state = self.state.lock();
        if state.queues.contains_key(&key) {
            if let Some(entry) = state.queues.get_mut(&key) {
                entry.queue = queue;
                entry.priority = priority;
                entry.pinned_thread = pinned_thread;
                entry.marked_deleted = false;
                entry.deleted_at = None;
            }
        } else {
            let _ = state.queues.insert(
                key,
                Entry {
                    queue,
                    priority,
                    pinned_thread,
                    marked_deleted: false,
                    deleted_at: None,
                },
            );
            state.priorities[priority as usize].push(key);
        }
        self.trigger.fire();
    }

    /// Marks `key` for deletion. The queue keeps draining normally; it is
    /// only actually removed once empty and past the GC grace interval
    /// (see [`ProcessQueueManager::gc_sweep`]).
    pub fn delete(&self, key: QueueKey) {
        let mut state = self.state.lock();
        if let Some(entry) = state.queues.get_mut(&key) {
            entry.marked_deleted = true;
        }
    }

    /// `true` iff `key` resolves to a queue that is currently push-valid.
    #[must_use]
    pub fn is_valid_to_push(&self, key: QueueKey) -> bool {
        self.state
            .lock()
            .queues
            .get(&key)
            .map(|e| !e.marked_deleted && e.queue.is_valid_to_push())
            .unwrap_or(false)
    }

    /// Pushes `item` onto the queue named by `key`.
    pub fn push(&self, key: QueueKey, item: T) -> QueueOutcome {
        let outcome = {
            let state = self.state.lock();
            match state.queues.get(&key) {
                Some(entry) if !entry.marked_deleted => entry.queue.push(item),
                Some(_) => QueueOutcome::NotFound,
                None => QueueOutcome::NotFound,
            }
        };
        if outcome == QueueOutcome::Ok {
            self.trigger.fire();
        }
        outcome
    }

    /// Pops one item for processing thread `thread_no`, walking priorities
    /// 0 → 3; within a priority, candidates are queues unpinned or pinned to
    /// `thread_no`, resumed from that `(thread_no, priority)`'s cursor and
    /// wrapped once (spec §4.6 round-robin fairness).
    pub fn pop_item(&self, thread_no: usize) -> Option<(QueueKey, T)> {
        let mut state = self.state.lock();
        for priority in 0..PRIORITY_LEVELS as u8 {
            let candidates: Vec<QueueKey> = state.priorities[priority as usize]
                .iter()
                .copied()
                .filter(|k| {
                    state
                        .queues
                        .get(k)
                        .map(|e| !e.marked_deleted && matches!(e.pinned_thread, None | Some(n) if n == thread_no))
                        .unwrap_or(false)
                })
                .collect();
            if candidates.is_empty() {
                continue;
            }
            let cursor_key = (thread_no, priority);
            let start = *state.cursors.get(&cursor_key).unwrap_or(&0) % candidates.len();
            for offset in 0..candidates.len() {
                let idx = (start + offset) % candidates.len();
                let key = candidates[idx];
                let queue = state.queues.get(&key).map(|e| e.queue.clone());
                if let Some(queue) = queue {
                    if let Some(item) = queue.pop() {
                        let _ = state.cursors.insert(cursor_key, (idx + 1) % candidates.len());
                        return Some((key, item));
                    }
                }
            }
        }
        None
    }

    /// Blocks until [`ProcessQueueManager::push`] (or `create_or_update`)
    /// fires the trigger, or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) {
        self.trigger.wait(timeout);
    }

    /// Removes queues that are marked for deletion, empty, and have been so
    /// for at least `grace` since first observed empty-and-deleted.
    pub fn gc_sweep(&self, grace: Duration) {
        let now = Instant::now();
        let mut state = self.state.lock();
        let mut to_remove = Vec::new();
        for (key, entry) in state.queues.iter_mut() {
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
            let _ = state.queues.remove(&key);
            for bucket in &mut state.priorities {
                bucket.retain(|k| *k != key);
            }
            let _ = self.registry.remove_key(key);
        }
    }
}
