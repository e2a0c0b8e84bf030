// SPDX-License-Identifier: Apache-2.0

//! Trait object wrapper unifying [`BoundedProcessQueue`] and
//! [`CircularProcessQueue`] so a manager can hold either behind one handle.
//!
//! [`BoundedProcessQueue`]: crate::bounded::BoundedProcessQueue
//! [`CircularProcessQueue`]: crate::circular::CircularProcessQueue

use crate::bounded::BoundedProcessQueue;
use crate::circular::CircularProcessQueue;
use crate::push_gate::{HasEventCount, QueueOutcome};

/// Operations common to every process queue kind, as needed by
/// [`crate::process_manager::ProcessQueueManager`].
pub trait ProcessQueueOps<T>: Send + Sync {
    /// Pushes `item`.
    fn push(&self, item: T) -> QueueOutcome;
    /// Pops the next item, if any, respecting pop-validity and (for
    /// bounded queues) downstream backpressure.
    fn pop(&self) -> Option<T>;
    /// Disables pop during a pipeline reload.
    fn invalidate_pop(&self);
    /// Re-enables pop.
    fn validate_pop(&self);
    /// `true` iff the queue currently holds no items.
    fn is_empty(&self) -> bool;
    /// `true` iff a push would currently succeed (always `true` for a
    /// circular queue, which never rejects a push).
    fn is_valid_to_push(&self) -> bool;
}

impl<T: Send + Sync> ProcessQueueOps<T> for BoundedProcessQueue<T> {
    fn push(&self, item: T) -> QueueOutcome {
        BoundedProcessQueue::push(self, item)
    }

    fn pop(&self) -> Option<T> {
        BoundedProcessQueue::pop(self)
    }

    fn invalidate_pop(&self) {
        BoundedProcessQueue::invalidate_pop(self);
    }

    fn validate_pop(&self) {
        BoundedProcessQueue::validate_pop(self);
    }

    fn is_empty(&self) -> bool {
        BoundedProcessQueue::is_empty(self)
    }

    fn is_valid_to_push(&self) -> bool {
        BoundedProcessQueue::is_valid_to_push(self)
    }
}

impl<T: HasEventCount + Send + Sync> ProcessQueueOps<T> for CircularProcessQueue<T> {
    fn push(&self, item: T) -> QueueOutcome {
        CircularProcessQueue::push(self, item);
        QueueOutcome::Ok
    }

    fn pop(&self) -> Option<T> {
        CircularProcessQueue::pop(self)
    }

    fn invalidate_pop(&self) {
        CircularProcessQueue::invalidate_pop(self);
    }

    fn validate_pop(&self) {
        CircularProcessQueue::validate_pop(self);
    }

    fn is_empty(&self) -> bool {
        CircularProcessQueue::is_empty(self)
    }

    fn is_valid_to_push(&self) -> bool {
        true
    }
}
