// SPDX-License-Identifier: Apache-2.0

//! Drains per-destination sender queues, dispatches items over HTTP (or an
//! in-process test sink), and applies the per-flusher retry policy to
//! whatever comes back (spec §4.9, §4.10, §4.11).

mod alarm;
mod error_kind;
mod flusher_trait;
mod http_sink;
mod pack_id;
mod retry_policy;
mod runner;

pub use alarm::{AlarmCategory, AlarmEmitter};
pub use error_kind::{FlusherError, SendOutcome};
pub use flusher_trait::{Flusher, HttpRequestSpec};
pub use http_sink::HttpSink;
pub use pack_id::PackIdManager;
pub use retry_policy::{RetryOperation, RetryPolicy, RetryPolicyConfig};
pub use runner::{FlusherBinding, FlusherRunner, FlusherRunnerConfig, SinkKind};
