// SPDX-License-Identifier: Apache-2.0

//! Trait object wrapper unifying [`BoundedSenderQueue`] and
//! [`ExactlyOnceSenderQueue`] so a manager can hold either behind one handle.

use crate::bounded_sender::BoundedSenderQueue;
use crate::exactly_once::ExactlyOnceSenderQueue;
use crate::item::SenderQueueItem;
use conduit_queue::QueueOutcome;
use std::sync::Arc;

/// Operations common to every sender queue kind.
pub trait SenderQueueOps: Send + Sync {
    /// Pushes `item`.
    fn push(&self, item: Arc<SenderQueueItem>) -> QueueOutcome;
    /// Removes `item` after ack or terminal discard.
    fn remove(&self, item: &Arc<SenderQueueItem>) -> bool;
    /// Collects up to `limit` ready items, applying the rate/concurrency
    /// limiter protocol.
    fn get_available_items(&self, limit: usize) -> Vec<Arc<SenderQueueItem>>;
    /// `true` iff a push would currently succeed.
    fn is_valid_to_push(&self) -> bool;
    /// `true` iff the queue currently holds no items.
    fn is_empty(&self) -> bool;
}

impl SenderQueueOps for BoundedSenderQueue {
    fn push(&self, item: Arc<SenderQueueItem>) -> QueueOutcome {
        BoundedSenderQueue::push(self, item)
    }

    fn remove(&self, item: &Arc<SenderQueueItem>) -> bool {
        BoundedSenderQueue::remove(self, item)
    }

    fn get_available_items(&self, limit: usize) -> Vec<Arc<SenderQueueItem>> {
        BoundedSenderQueue::get_available_items(self, limit)
    }

    fn is_valid_to_push(&self) -> bool {
        conduit_queue::PushGate::is_valid_to_push(self)
    }

    fn is_empty(&self) -> bool {
        BoundedSenderQueue::is_empty(self)
    }
}

impl SenderQueueOps for ExactlyOnceSenderQueue {
    fn push(&self, item: Arc<SenderQueueItem>) -> QueueOutcome {
        match ExactlyOnceSenderQueue::push(self, item) {
            Ok(outcome) => outcome,
            Err(_) => QueueOutcome::NotFound,
        }
    }

    fn remove(&self, item: &Arc<SenderQueueItem>) -> bool {
        ExactlyOnceSenderQueue::remove(self, item)
    }

    fn get_available_items(&self, limit: usize) -> Vec<Arc<SenderQueueItem>> {
        ExactlyOnceSenderQueue::get_available_items(self, limit)
    }

    fn is_valid_to_push(&self) -> bool {
        conduit_queue::PushGate::is_valid_to_push(self)
    }

    fn is_empty(&self) -> bool {
        ExactlyOnceSenderQueue::is_empty(self)
    }
}
