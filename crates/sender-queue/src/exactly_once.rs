// SPDX-License-Identifier: Apache-2.0

//! Slot-indexed sender queue, one slot per active range checkpoint,
//! providing exactly-once delivery for file-sourced pipelines (spec §4.5).

use crate::item::{CheckpointHandle, SendStatus, SenderQueueItem};
use conduit_limiter::{ConcurrencyLimiter, RateLimiter};
use conduit_model::RangeCheckpoint;
use conduit_queue::{Feedback, PushGate, QueueOutcome};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct Inner {
    /// One persistent checkpoint object per slot, bound to a permanent
    /// shard hash key for the life of the queue.
    slot_checkpoints: Vec<RangeCheckpoint>,
    slot_items: Vec<Option<Arc<SenderQueueItem>>>,
    extra_buffer: VecDeque<Arc<SenderQueueItem>>,
    write_cursor: usize,
    valid_to_push: bool,
}

/// Error returned when a caller tries to place an already-bound (replay)
/// checkpoint at a slot that is not empty — a caller logic error per spec
/// §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("exactly-once slot {0} already occupied")]
pub struct SlotOccupied(pub usize);

/// Fixed-slot sender queue: capacity = N, low_watermark = N-1, high = N.
pub struct ExactlyOnceSenderQueue {
    slot_count: usize,
    inner: Mutex<Inner>,
    feedbacks: Mutex<Vec<Arc<dyn Feedback>>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    concurrency_limiters: Vec<Arc<ConcurrencyLimiter>>,
}

impl ExactlyOnceSenderQueue {
    /// Creates a queue with one slot per entry in `hash_keys`, each slot
    /// permanently bound to that hash key from construction.
    #[must_use]
    pub fn new(
        hash_keys: Vec<String>,
        feedback_key_base: u64,
        rate_limiter: Option<Arc<RateLimiter>>,
        concurrency_limiters: Vec<Arc<ConcurrencyLimiter>>,
    ) -> Self {
        let slot_count = hash_keys.len();
        let slot_checkpoints: Vec<RangeCheckpoint> = hash_keys
            .into_iter()
            .enumerate()
            .map(|(index, hash_key)| {
                let cp = RangeCheckpoint::new(index, feedback_key_base + index as u64);
                cp.bind(hash_key, 0, 0);
                cp
            })
            .collect();
        Self {
            slot_count,
            inner: Mutex::new(Inner {
                slot_checkpoints,
                slot_items: (0..slot_count).map(|_| None).collect(),
                extra_buffer: VecDeque::new(),
                write_cursor: 0,
                valid_to_push: true,
            }),
            feedbacks: Mutex::new(Vec::new()),
            rate_limiter,
            concurrency_limiters,
        }
    }

    /// Registers the feedback hook invoked on a low-watermark crossing.
    pub fn set_feedbacks(&self, feedbacks: Vec<Arc<dyn Feedback>>) {
        *self.feedbacks.lock() = feedbacks;
    }

    fn occupied_count(inner: &Inner) -> usize {
        inner.slot_items.iter().filter(|s| s.is_some()).count() + inner.extra_buffer.len()
    }

    fn update_watermark(&self, inner: &mut Inner) {
        let total = Self::occupied_count(inner);
        let high_watermark = self.slot_count;
        let low_watermark = self.slot_count.saturating_sub(1);
        if total >= high_watermark {
            inner.valid_to_push = false;
        } else if total <= low_watermark && !inner.valid_to_push {
            inner.valid_to_push = true;
            let feedbacks = self.feedbacks.lock();
            for feedback in feedbacks.iter() {
                feedback.notify();
            }
        }
    }

    fn place_in_slot(&self, inner: &mut Inner, index: usize, item: &Arc<SenderQueueItem>, checkpoint: RangeCheckpoint) {
        inner.slot_items[index] = Some(item.clone());
        checkpoint.prepare();
        item.set_checkpoint(CheckpointHandle::Bound(checkpoint));
    }

    /// Places `item` into a slot. See spec §4.5 for the two paths:
    /// a bound (replay) checkpoint goes straight to its `index`; an unbound
    /// one claims the first empty slot starting at `write_cursor`, or waits
    /// in `extra_buffer` if none is free.
    pub fn push(&self, item: Arc<SenderQueueItem>) -> Result<QueueOutcome, SlotOccupied> {
        let mut inner = self.inner.lock();
        let handle = item.checkpoint().expect("exactly-once item must carry a checkpoint handle");
        match handle {
            CheckpointHandle::Bound(checkpoint) => {
                let index = checkpoint.index();
                if inner.slot_items[index].is_some() {
                    return Err(SlotOccupied(index));
                }
                let hash_key = checkpoint.hash_key().unwrap_or_default();
                item.set_shard_hash_key(hash_key);
                self.place_in_slot(&mut inner, index, &item, checkpoint);
                self.update_watermark(&mut inner);
                Ok(QueueOutcome::Ok)
            }
            CheckpointHandle::Pending {
                read_offset,
                read_length,
            } => {
                let mut found = None;
                for offset in 0..self.slot_count {
                    let idx = (inner.write_cursor + offset) % self.slot_count;
                    if inner.slot_items[idx].is_none() {
                        found = Some(idx);
                        break;
                    }
                }
                match found {
                    Some(idx) => {
                        let checkpoint = inner.slot_checkpoints[idx].clone();
                        checkpoint.set_range(read_offset, read_length);
                        let hash_key = checkpoint.hash_key().unwrap_or_default();
                        item.set_shard_hash_key(hash_key);
                        self.place_in_slot(&mut inner, idx, &item, checkpoint);
                        inner.write_cursor = (idx + 1) % self.slot_count;
                        self.update_watermark(&mut inner);
                        Ok(QueueOutcome::Ok)
                    }
                    None => {
                        inner.extra_buffer.push_back(item);
                        self.update_watermark(&mut inner);
                        Ok(QueueOutcome::Ok)
                    }
                }
            }
        }
    }

    /// Frees `item`'s slot after a successful ack or terminal discard, then
    /// immediately tries to place the front of `extra_buffer` (which will
    /// now find a free slot).
    pub fn remove(&self, item: &Arc<SenderQueueItem>) -> bool {
        let index = match item.checkpoint() {
            Some(CheckpointHandle::Bound(cp)) => cp.index(),
            _ => return false,
        };
        let mut inner = self.inner.lock();
        match &inner.slot_items[index] {
            Some(current) if Arc::ptr_eq(current, item) => {
                inner.slot_items[index] = None;
            }
            _ => return false,
        }
        self.update_watermark(&mut inner);
        if let Some(waiting) = inner.extra_buffer.pop_front() {
            drop(inner);
            // Re-push through the normal path so it goes through the same
            // slot-claiming logic (it is guaranteed to find a free slot).
            let _ = self.push(waiting);
        }
        true
    }

    /// Collects up to `limit` idle items across all slots, applying the
    /// same limiter protocol as [`crate::bounded_sender::BoundedSenderQueue`].
    pub fn get_available_items(&self, limit: usize) -> Vec<Arc<SenderQueueItem>> {
        let inner = self.inner.lock();
        let mut out = Vec::with_capacity(limit);
        for slot in inner.slot_items.iter().flatten() {
            if out.len() >= limit {
                break;
            }
            if let Some(rl) = &self.rate_limiter {
                if !rl.is_valid_to_pop() {
                    break;
                }
            }
            if self.concurrency_limiters.iter().any(|cl| !cl.is_valid_to_pop()) {
                break;
            }
            if slot.status() != SendStatus::Idle {
                continue;
            }
            slot.set_status(SendStatus::Sending);
            for cl in &self.concurrency_limiters {
                cl.post_pop();
            }
            if let Some(rl) = &self.rate_limiter {
                rl.post_pop(slot.size());
            }
            out.push(slot.clone());
        }
        out
    }

    /// Number of occupied slots plus buffered overflow items.
    #[must_use]
    pub fn len(&self) -> usize {
        Self::occupied_count(&self.inner.lock())
    }

    /// `true` iff no slot is occupied and no item is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` iff slot `index` is currently occupied; used by tests
    /// and the slot-bijection property check.
    #[must_use]
    pub fn slot_occupied(&self, index: usize) -> bool {
        self.inner.lock().slot_items[index].is_some()
    }
}

impl PushGate for ExactlyOnceSenderQueue {
    fn is_valid_to_push(&self) -> bool {
        self.inner.lock().valid_to_push
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_queue_key::QueueKeyRegistry;

    fn fresh_item(key: conduit_queue_key::QueueKey, offset: u64, length: u64) -> Arc<SenderQueueItem> {
        Arc::new(
            SenderQueueItem::new(bytes::Bytes::from_static(b"x"), 1, 1, key)
                .with_checkpoint(CheckpointHandle::Pending {
                    read_offset: offset,
                    read_length: length,
                }),
        )
    }

    #[test]
    fn scenario_push_with_unbound_checkpoint() {
        let registry = QueueKeyRegistry::new();
        let key = registry.get_key("dest");
        let q = ExactlyOnceSenderQueue::new(
            vec!["shard-0".to_string(), "shard-1".to_string()],
            100,
            None,
            Vec::new(),
        );
        let item = fresh_item(key, 0, 10);
        assert_eq!(q.push(item.clone()).unwrap(), QueueOutcome::Ok);
        assert!(q.slot_occupied(0));
        assert!(!q.slot_occupied(1));
        assert_eq!(item.shard_hash_key().as_deref(), Some("shard-0"));
        match item.checkpoint() {
            Some(CheckpointHandle::Bound(cp)) => assert_eq!(cp.read_range(), (0, 10)),
            other => panic!("expected bound checkpoint, got {other:?}"),
        }
    }

    #[test]
    fn scenario_push_with_prebound_checkpoint() {
        let registry = QueueKeyRegistry::new();
        let key = registry.get_key("dest");
        let q = ExactlyOnceSenderQueue::new(
            vec!["shard-0".to_string(), "shard-1".to_string()],
            100,
            None,
            Vec::new(),
        );
        let replay_cp = RangeCheckpoint::new(1, 999);
        replay_cp.bind("k".to_string(), 5, 5);
        let item = Arc::new(
            SenderQueueItem::new(bytes::Bytes::from_static(b"x"), 1, 1, key)
                .with_checkpoint(CheckpointHandle::Bound(replay_cp)),
        );
        assert_eq!(q.push(item).unwrap(), QueueOutcome::Ok);
        assert!(q.slot_occupied(1));
        assert!(!q.slot_occupied(0));
    }

    #[test]
    fn prebound_push_into_occupied_slot_is_rejected() {
        let registry = QueueKeyRegistry::new();
        let key = registry.get_key("dest");
        let q = ExactlyOnceSenderQueue::new(vec!["shard-0".to_string()], 100, None, Vec::new());
        let first = fresh_item(key, 0, 1);
        assert_eq!(q.push(first).unwrap(), QueueOutcome::Ok);

        let replay_cp = RangeCheckpoint::new(0, 1);
        replay_cp.bind("other".to_string(), 0, 0);
        let second = Arc::new(
            SenderQueueItem::new(bytes::Bytes::from_static(b"y"), 1, 1, key)
                .with_checkpoint(CheckpointHandle::Bound(replay_cp)),
        );
        assert!(q.push(second).is_err());
    }

    #[test]
    fn overflow_buffers_when_all_slots_taken_then_drains_on_remove() {
        let registry = QueueKeyRegistry::new();
        let key = registry.get_key("dest");
        let q = ExactlyOnceSenderQueue::new(vec!["shard-0".to_string()], 100, None, Vec::new());
        let a = fresh_item(key, 0, 1);
        let b = fresh_item(key, 1, 1);
        assert_eq!(q.push(a.clone()).unwrap(), QueueOutcome::Ok);
        assert_eq!(q.push(b).unwrap(), QueueOutcome::Ok);
        assert_eq!(q.len(), 2);

        assert!(q.remove(&a));
        // b should now occupy slot 0
        assert!(q.slot_occupied(0));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn sequence_id_advances_only_after_commit() {
        let registry = QueueKeyRegistry::new();
        let key = registry.get_key("dest");
        let q = ExactlyOnceSenderQueue::new(vec!["shard-0".to_string()], 100, None, Vec::new());
        let item = fresh_item(key, 0, 1);
        q.push(item.clone()).unwrap();
        let cp = match item.checkpoint() {
            Some(CheckpointHandle::Bound(cp)) => cp,
            _ => panic!("expected bound"),
        };
        assert_eq!(cp.sequence_id(), 0);
        cp.commit();
        cp.increase_sequence_id();
        assert_eq!(cp.sequence_id(), 1);
    }
}
