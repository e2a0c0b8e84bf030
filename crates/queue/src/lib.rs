// SPDX-License-Identifier: Apache-2.0

//! Per-pipeline process queues: bounded (backpressure) and circular (lossy),
//! plus the manager that registers, fairly iterates, and GCs them.

mod bounded;
mod circular;
mod process_manager;
mod process_queue_ops;
mod push_gate;
mod trigger;

pub use bounded::BoundedProcessQueue;
pub use circular::CircularProcessQueue;
pub use process_manager::{ProcessQueueManager, PRIORITY_LEVELS};
pub use process_queue_ops::ProcessQueueOps;
pub use push_gate::{ClosureFeedback, Feedback, HasEventCount, PushGate, QueueOutcome};
pub use trigger::Trigger;
