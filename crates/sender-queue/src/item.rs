// SPDX-License-Identifier: Apache-2.0

//! A serialized payload awaiting network dispatch.

use bytes::Bytes;
use conduit_model::RangeCheckpoint;
use conduit_queue_key::QueueKey;
use parking_lot::Mutex;
use std::time::Instant;

/// Small integer handle identifying the flusher that produced an item,
/// replacing a pointer-based back-reference (spec §9).
pub type FlusherId = u32;

/// Sending status of a [`SenderQueueItem`] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Not currently being sent; eligible for the next `get_available_items`.
    Idle,
    /// Popped by the runner and handed to a sink; excluded from further
    /// pops until the sink reports completion.
    Sending,
}

/// An exactly-once item's checkpoint binding, before and after it claims a
/// queue slot.
#[derive(Debug, Clone)]
pub enum CheckpointHandle {
    /// Not yet bound to any slot; carries only the raw byte range a file
    /// reader wants committed once this item is acknowledged.
    Pending {
        /// Offset into the source file this item's bytes start at.
        read_offset: u64,
        /// Number of bytes this item covers.
        read_length: u64,
    },
    /// Already bound to a specific slot index and hash key — either because
    /// a slot assigned it (see [`crate::exactly_once::ExactlyOnceSenderQueue`])
    /// or because it is a replay of a checkpoint persisted before a crash.
    Bound(RangeCheckpoint),
}

impl CheckpointHandle {
    /// `true` iff this handle is already bound to a slot (spec §4.5:
    /// "is_complete").
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, CheckpointHandle::Bound(_))
    }
}

struct ItemState {
    last_send_time: Option<Instant>,
    try_count: u32,
    status: SendStatus,
    checkpoint: Option<CheckpointHandle>,
    shard_hash_key: Option<String>,
}

/// A serialized (and optionally compressed) payload ready to be sent.
///
/// `try_count` starts at 1 on construction and only increases while the item
/// is being retried (spec §3); `status` transitions IDLE → SENDING on pop by
/// the runner, then either is removed (success) or returns to IDLE
/// (retry-later). A `SenderQueueItem` is owned by exactly one sender queue
/// from push until remove — it is never cloned into two queues at once.
pub struct SenderQueueItem {
    /// Encoded, possibly-compressed payload bytes.
    pub payload: Bytes,
    /// Pre-compression size in bytes, used in outbound headers.
    pub raw_size: u64,
    /// Handle to the flusher that produced this item.
    pub flusher_id: FlusherId,
    /// Destination sender queue this item belongs to.
    pub destination: QueueKey,
    /// Time this item was constructed and handed to a sender queue.
    pub enqueue_time: Instant,
    state: Mutex<ItemState>,
}

impl SenderQueueItem {
    /// Builds a fresh item with `try_count == 1` and status `Idle`.
    #[must_use]
    pub fn new(payload: Bytes, raw_size: u64, flusher_id: FlusherId, destination: QueueKey) -> Self {
        Self {
            payload,
            raw_size,
            flusher_id,
            destination,
            enqueue_time: Instant::now(),
            state: Mutex::new(ItemState {
                last_send_time: None,
                try_count: 1,
                status: SendStatus::Idle,
                checkpoint: None,
                shard_hash_key: None,
            }),
        }
    }

    /// Attaches a checkpoint handle, opting this item into exactly-once
    /// delivery.
    #[must_use]
    pub fn with_checkpoint(self, checkpoint: CheckpointHandle) -> Self {
        self.state.lock().checkpoint = Some(checkpoint);
        self
    }

    /// Number of bytes this item's payload occupies, used by the rate
    /// limiter's rolling window.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Current sending status.
    #[must_use]
    pub fn status(&self) -> SendStatus {
        self.state.lock().status
    }

    pub(crate) fn set_status(&self, status: SendStatus) {
        self.state.lock().status = status;
    }

    /// Returns the item to `Idle` after a retry-later classification, so
    /// the next `get_available_items` call is free to re-pop it (spec
    /// §4.11: "set status IDLE in-place").
    pub fn mark_retry_later(&self) {
        self.set_status(SendStatus::Idle);
    }

    /// Number of send attempts made so far (starts at 1).
    #[must_use]
    pub fn try_count(&self) -> u32 {
        self.state.lock().try_count
    }

    /// Increments the try count and records `now` as the last-send time,
    /// called when the item is handed to the HTTP sink.
    pub fn record_attempt(&self, now: Instant) {
        let mut state = self.state.lock();
        state.try_count += 1;
        state.last_send_time = Some(now);
    }

    /// Time of the last send attempt, if any.
    #[must_use]
    pub fn last_send_time(&self) -> Option<Instant> {
        self.state.lock().last_send_time
    }

    /// Current checkpoint handle, if this item opted into exactly-once
    /// delivery.
    #[must_use]
    pub fn checkpoint(&self) -> Option<CheckpointHandle> {
        self.state.lock().checkpoint.clone()
    }

    pub(crate) fn set_checkpoint(&self, checkpoint: CheckpointHandle) {
        self.state.lock().checkpoint = Some(checkpoint);
    }

    /// Shard-hash key used for destination routing, set once a slot is
    /// claimed in an exactly-once queue.
    #[must_use]
    pub fn shard_hash_key(&self) -> Option<String> {
        self.state.lock().shard_hash_key.clone()
    }

    pub(crate) fn set_shard_hash_key(&self, key: String) {
        self.state.lock().shard_hash_key = Some(key);
    }
}

impl std::fmt::Debug for SenderQueueItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderQueueItem")
            .field("raw_size", &self.raw_size)
            .field("destination", &self.destination)
            .field("status", &self.status())
            .field("try_count", &self.try_count())
            .finish()
    }
}
