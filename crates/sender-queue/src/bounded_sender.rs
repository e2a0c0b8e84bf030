// SPDX-License-Identifier: Apache-2.0

//! Bounded ring of serialized payloads destined for one target, with an
//! unbounded overflow buffer so push never drops data (spec §4.4).

use crate::item::{SendStatus, SenderQueueItem};
use conduit_limiter::{ConcurrencyLimiter, RateLimiter};
use conduit_queue::{Feedback, PushGate, QueueOutcome};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct Inner {
    ring: VecDeque<Arc<SenderQueueItem>>,
    extra_buffer: VecDeque<Arc<SenderQueueItem>>,
    valid_to_push: bool,
}

/// A bounded sender queue. `capacity` sizes the ring; `extra_buffer` grows
/// without bound but counts toward the watermark so backpressure kicks in
/// quickly rather than only once the ring itself is full.
pub struct BoundedSenderQueue {
    capacity: usize,
    low_watermark: usize,
    high_watermark: usize,
    inner: Mutex<Inner>,
    feedbacks: Mutex<Vec<Arc<dyn Feedback>>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    concurrency_limiters: Vec<Arc<ConcurrencyLimiter>>,
}

impl BoundedSenderQueue {
    /// Creates a queue with the given ring capacity and watermarks, plus the
    /// limiters that gate `get_available_items`.
    #[must_use]
    pub fn new(
        capacity: usize,
        low_watermark: usize,
        high_watermark: usize,
        rate_limiter: Option<Arc<RateLimiter>>,
        concurrency_limiters: Vec<Arc<ConcurrencyLimiter>>,
    ) -> Self {
        assert!(low_watermark <= high_watermark && high_watermark <= capacity);
        Self {
            capacity,
            low_watermark,
            high_watermark,
            inner: Mutex::new(Inner {
                ring: VecDeque::new(),
                extra_buffer: VecDeque::new(),
                valid_to_push: true,
            }),
            feedbacks: Mutex::new(Vec::new()),
            rate_limiter,
            concurrency_limiters,
        }
    }

    /// Registers a feedback hook invoked once per low-watermark crossing.
    pub fn set_feedbacks(&self, feedbacks: Vec<Arc<dyn Feedback>>) {
        *self.feedbacks.lock() = feedbacks;
    }

    fn total_len(inner: &Inner) -> usize {
        inner.ring.len() + inner.extra_buffer.len()
    }

    /// Pushes `item`. Never fails: once the ring is full, items spill into
    /// the unbounded overflow buffer. Flips push-validity once the combined
    /// size reaches `high_watermark`.
    pub fn push(&self, item: Arc<SenderQueueItem>) -> QueueOutcome {
        let mut inner = self.inner.lock();
        if inner.ring.len() < self.capacity {
            inner.ring.push_back(item);
        } else {
            inner.extra_buffer.push_back(item);
        }
        if Self::total_len(&inner) >= self.high_watermark {
            inner.valid_to_push = false;
        }
        QueueOutcome::Ok
    }

    /// Removes `item` (matched by pointer identity) after a successful ack
    /// or terminal discard. Drains one item from the overflow buffer into
    /// the ring if one is waiting, and fires feedback if the combined size
    /// drops to `low_watermark`.
    pub fn remove(&self, item: &Arc<SenderQueueItem>) -> bool {
        let mut inner = self.inner.lock();
        let position = inner.ring.iter().position(|i| Arc::ptr_eq(i, item));
        let removed = match position {
            Some(idx) => {
                let _ = inner.ring.remove(idx);
                true
            }
            None => {
                let pos = inner.extra_buffer.iter().position(|i| Arc::ptr_eq(i, item));
                match pos {
                    Some(idx) => {
                        let _ = inner.extra_buffer.remove(idx);
                        true
                    }
                    None => false,
                }
            }
        };
        if !removed {
            return false;
        }
        if let Some(promoted) = inner.extra_buffer.pop_front() {
            inner.ring.push_back(promoted);
        }
        if Self::total_len(&inner) <= self.low_watermark && !inner.valid_to_push {
            inner.valid_to_push = true;
            drop(inner);
            for feedback in self.feedbacks.lock().iter() {
                feedback.notify();
            }
        }
        true
    }

    /// Collects up to `limit` ready items in ring order, applying the
    /// limiter protocol from spec §4.4: stop at the first rate- or
    /// concurrency-limited item, skip non-`Idle` items, flip selected items
    /// to `Sending` and charge every attached limiter.
    pub fn get_available_items(&self, limit: usize) -> Vec<Arc<SenderQueueItem>> {
        let inner = self.inner.lock();
        let mut out = Vec::with_capacity(limit.min(inner.ring.len()));
        for item in inner.ring.iter() {
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
            if item.status() != SendStatus::Idle {
                continue;
            }
            item.set_status(SendStatus::Sending);
            for cl in &self.concurrency_limiters {
                cl.post_pop();
            }
            if let Some(rl) = &self.rate_limiter {
                rl.post_pop(item.size());
            }
            out.push(item.clone());
        }
        out
    }

    /// Total items held (ring plus overflow).
    #[must_use]
    pub fn len(&self) -> usize {
        Self::total_len(&self.inner.lock())
    }

    /// `true` iff no items are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PushGate for BoundedSenderQueue {
    fn is_valid_to_push(&self) -> bool {
        self.inner.lock().valid_to_push
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::FlusherId;
    use bytes::Bytes;
    use conduit_queue_key::QueueKeyRegistry;

    fn item(flusher: FlusherId, key: conduit_queue_key::QueueKey) -> Arc<SenderQueueItem> {
        Arc::new(SenderQueueItem::new(Bytes::from_static(b"x"), 1, flusher, key))
    }

    #[test]
    fn scenario_bounded_push_pop_watermark() {
        let registry = QueueKeyRegistry::new();
        let key = registry.get_key("dest");
        let q = BoundedSenderQueue::new(2, 1, 2, None, Vec::new());
        let a = item(1, key);
        let b = item(2, key);
        let c = item(3, key);

        assert_eq!(q.push(a.clone()), QueueOutcome::Ok);
        assert_eq!(q.push(b.clone()), QueueOutcome::Ok);
        assert_eq!(q.push(c.clone()), QueueOutcome::Ok);
        assert!(!q.is_valid_to_push());
        assert_eq!(q.len(), 3);

        assert!(q.remove(&a));
        assert!(!q.is_valid_to_push());
        assert_eq!(q.len(), 2);

        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let fired_clone = fired.clone();
        q.set_feedbacks(vec![Arc::new(conduit_queue::ClosureFeedback(move || {
            let _ = fired_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }))]);

        assert!(q.remove(&b));
        assert!(q.is_valid_to_push());
        assert_eq!(q.len(), 1);
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn get_available_items_skips_sending_items() {
        let registry = QueueKeyRegistry::new();
        let key = registry.get_key("dest");
        let q = BoundedSenderQueue::new(4, 1, 4, None, Vec::new());
        let a = item(1, key);
        let b = item(2, key);
        q.push(a.clone());
        q.push(b.clone());

        let first_pass = q.get_available_items(10);
        assert_eq!(first_pass.len(), 2);
        assert_eq!(a.status(), SendStatus::Sending);

        let second_pass = q.get_available_items(10);
        assert!(second_pass.is_empty());
    }

    #[test]
    fn get_available_items_stops_at_rate_limit() {
        let registry = QueueKeyRegistry::new();
        let key = registry.get_key("dest");
        let rate = Arc::new(RateLimiter::new(0));
        let q = BoundedSenderQueue::new(4, 1, 4, Some(rate), Vec::new());
        q.push(item(1, key));
        assert!(q.get_available_items(10).is_empty());
    }
}
