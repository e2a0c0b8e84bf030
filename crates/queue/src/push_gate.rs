// SPDX-License-Identifier: Apache-2.0

//! Cross-queue contracts used to propagate backpressure without cyclic
//! pointers between queues (spec §9: feedback is a pure function, not a
//! pointer to the other queue).

/// Outcome of a queue push, matching spec §7 item 10's tri-state result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// The item was accepted.
    Ok,
    /// The queue is not currently push-valid.
    Full,
    /// The queue key does not resolve to a registered queue.
    NotFound,
}

/// Something a process queue can ask "can I push to you right now?" without
/// holding a reference to the concrete downstream queue type. Implemented by
/// sender queues (in `conduit-sender-queue`) and by test doubles.
pub trait PushGate: Send + Sync {
    /// `true` iff a push into the downstream queue would currently succeed.
    fn is_valid_to_push(&self) -> bool;
}

/// A callback invoked when a queue transitions from not-pushable to
/// pushable, waking whatever upstream produces items for it (typically a
/// file reader, or another process queue's pop loop).
pub trait Feedback: Send + Sync {
    /// Invoked once per low-watermark crossing.
    fn notify(&self);
}

/// A [`Feedback`] built from a plain closure.
pub struct ClosureFeedback<F: Fn() + Send + Sync>(pub F);

impl<F: Fn() + Send + Sync> Feedback for ClosureFeedback<F> {
    fn notify(&self) {
        (self.0)();
    }
}

/// Something whose size should count against a [`CircularProcessQueue`]'s
/// capacity in events rather than items.
///
/// [`CircularProcessQueue`]: crate::circular::CircularProcessQueue
pub trait HasEventCount {
    /// Number of individual events this item represents.
    fn event_count(&self) -> usize;
}

impl HasEventCount for conduit_model::ProcessQueueItem {
    fn event_count(&self) -> usize {
        self.group.len()
    }
}
