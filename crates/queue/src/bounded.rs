// SPDX-License-Identifier: Apache-2.0

//! Bounded FIFO process queue with high/low watermark backpressure.

use crate::push_gate::{Feedback, PushGate, QueueOutcome};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Inner<T> {
    items: VecDeque<T>,
    valid_to_push: bool,
}

/// A bounded, backpressure-aware FIFO of event batches for one pipeline.
///
/// `pop` is gated on every downstream sender queue still being push-valid
/// (spec §4.2): this propagates backpressure through a whole pipeline
/// without cross-queue locks, since each downstream is only ever asked
/// "are you pushable right now", never mutated.
pub struct BoundedProcessQueue<T> {
    capacity: usize,
    low_watermark: usize,
    high_watermark: usize,
    inner: Mutex<Inner<T>>,
    valid_to_pop: AtomicBool,
    downstream: Mutex<Vec<Arc<dyn PushGate>>>,
    upstream_feedbacks: Mutex<Vec<Arc<dyn Feedback>>>,
}

impl<T> BoundedProcessQueue<T> {
    /// Creates a queue with the given capacity and watermarks.
    ///
    /// # Panics
    /// Panics if `low_watermark > high_watermark` or `high_watermark >
    /// capacity`, an invariant from spec §3.
    #[must_use]
    pub fn new(capacity: usize, low_watermark: usize, high_watermark: usize) -> Self {
        assert!(low_watermark <= high_watermark && high_watermark <= capacity);
        Self {
            capacity,
            low_watermark,
            high_watermark,
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                valid_to_push: true,
            }),
            valid_to_pop: AtomicBool::new(true),
            downstream: Mutex::new(Vec::new()),
            upstream_feedbacks: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the set of downstream sender queues this process queue's
    /// `pop` is gated on.
    pub fn set_downstream_queues(&self, downstream: Vec<Arc<dyn PushGate>>) {
        *self.downstream.lock() = downstream;
    }

    /// Replaces the set of upstream feedback hooks invoked when this queue
    /// crosses back below its low watermark.
    pub fn set_upstream_feedbacks(&self, feedbacks: Vec<Arc<dyn Feedback>>) {
        *self.upstream_feedbacks.lock() = feedbacks;
    }

    /// `true` iff a push would currently succeed.
    #[must_use]
    pub fn is_valid_to_push(&self) -> bool {
        self.inner.lock().valid_to_push
    }

    /// Pushes `item`. Fails with [`QueueOutcome::Full`] iff the queue is
    /// not currently push-valid.
    pub fn push(&self, item: T) -> QueueOutcome {
        let mut inner = self.inner.lock();
        if !inner.valid_to_push {
            return QueueOutcome::Full;
        }
        inner.items.push_back(item);
        if inner.items.len() >= self.high_watermark {
            inner.valid_to_push = false;
        }
        QueueOutcome::Ok
    }

    /// Pops the oldest item iff this queue is pop-valid, non-empty, and
    /// every downstream sender queue currently allows a push.
    pub fn pop(&self) -> Option<T> {
        if !self.valid_to_pop.load(Ordering::Acquire) {
            return None;
        }
        {
            let downstream = self.downstream.lock();
            if downstream.iter().any(|d| !d.is_valid_to_push()) {
                return None;
            }
        }

        let mut inner = self.inner.lock();
        let item = inner.items.pop_front()?;
        if inner.items.len() <= self.low_watermark && !inner.valid_to_push {
            inner.valid_to_push = true;
            drop(inner);
            for feedback in self.upstream_feedbacks.lock().iter() {
                feedback.notify();
            }
        }
        Some(item)
    }

    /// `true` iff this queue currently holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Configured ring capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Disables `pop` regardless of contents, used while the owning
    /// pipeline reloads. Outstanding items stay queued.
    pub fn invalidate_pop(&self) {
        self.valid_to_pop.store(false, Ordering::Release);
    }

    /// Re-enables `pop` after a reload completes.
    pub fn validate_pop(&self) {
        self.valid_to_pop.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysValid;
    impl PushGate for AlwaysValid {
        fn is_valid_to_push(&self) -> bool {
            true
        }
    }

    struct NeverValid;
    impl PushGate for NeverValid {
        fn is_valid_to_push(&self) -> bool {
            false
        }
    }

    #[test]
    fn watermark_flips_push_validity() {
        let q = BoundedProcessQueue::new(4, 1, 3);
        assert!(q.push(1) == QueueOutcome::Ok);
        assert!(q.push(2) == QueueOutcome::Ok);
        assert!(q.push(3) == QueueOutcome::Ok);
        assert!(!q.is_valid_to_push());
        assert!(q.push(4) == QueueOutcome::Full);
    }

    #[test]
    fn pop_restores_push_validity_and_fires_feedback_once() {
        let q: BoundedProcessQueue<i32> = BoundedProcessQueue::new(4, 1, 3);
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let fired_clone = fired.clone();
        q.set_upstream_feedbacks(vec![Arc::new(crate::push_gate::ClosureFeedback(move || {
            let _ = fired_clone.fetch_add(1, Ordering::SeqCst);
        }))]);

        for v in [1, 2, 3] {
            assert_eq!(q.push(v), QueueOutcome::Ok);
        }
        assert!(!q.is_valid_to_push());

        assert_eq!(q.pop(), Some(1));
        assert!(!q.is_valid_to_push());
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        assert_eq!(q.pop(), Some(2));
        assert!(q.is_valid_to_push());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        assert_eq!(q.pop(), Some(3));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pop_gated_on_downstream_push_validity() {
        let q: BoundedProcessQueue<i32> = BoundedProcessQueue::new(4, 1, 3);
        assert_eq!(q.push(1), QueueOutcome::Ok);
        q.set_downstream_queues(vec![Arc::new(NeverValid)]);
        assert_eq!(q.pop(), None);
        q.set_downstream_queues(vec![Arc::new(AlwaysValid)]);
        assert_eq!(q.pop(), Some(1));
    }

    #[test]
    fn invalidate_pop_blocks_regardless_of_contents() {
        let q: BoundedProcessQueue<i32> = BoundedProcessQueue::new(4, 1, 3);
        assert_eq!(q.push(1), QueueOutcome::Ok);
        q.invalidate_pop();
        assert_eq!(q.pop(), None);
        q.validate_pop();
        assert_eq!(q.pop(), Some(1));
    }

    #[test]
    fn end_to_end_watermark_scenario_one_item_never_full_until_high() {
        let q: BoundedProcessQueue<i32> = BoundedProcessQueue::new(2, 1, 2);
        assert_eq!(q.push(1), QueueOutcome::Ok);
        assert!(q.is_valid_to_push());
        assert_eq!(q.push(2), QueueOutcome::Ok);
        assert!(!q.is_valid_to_push());
    }
}
