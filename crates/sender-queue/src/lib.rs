// SPDX-License-Identifier: Apache-2.0

//! Per-destination sender queues: bounded (ring + overflow) and
//! exactly-once (slot-indexed), plus the manager the flusher runner drains.

mod bounded_sender;
mod exactly_once;
mod item;
mod manager;
mod sender_queue_ops;

pub use bounded_sender::BoundedSenderQueue;
pub use exactly_once::{ExactlyOnceSenderQueue, SlotOccupied};
pub use item::{CheckpointHandle, FlusherId, SendStatus, SenderQueueItem};
pub use manager::SenderQueueManager;
pub use sender_queue_ops::SenderQueueOps;
