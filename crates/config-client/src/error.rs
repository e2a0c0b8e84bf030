// SPDX-License-Identifier: Apache-2.0

//! Errors returned by a single heartbeat attempt, grounded on the teacher's
//! `azure_monitor_exporter::error::Error` status-code branching.

use std::time::Duration;

/// Failure modes for one heartbeat POST.
#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    #[error("failed to build http client: {0}")]
    BuildClient(#[source] reqwest::Error),
    #[error("network error sending heartbeat: {0}")]
    Network(#[source] reqwest::Error),
    #[error("config server rejected heartbeat as unauthorized: {0}")]
    Unauthorized(String),
    #[error("config server forbade heartbeat: {0}")]
    Forbidden(String),
    #[error("heartbeat payload too large")]
    PayloadTooLarge,
    #[error("config server rate-limited heartbeat, retry_after={retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },
    #[error("config server returned {status}, retry_after={retry_after:?}: {body}")]
    ServerError { status: u16, body: String, retry_after: Option<Duration> },
    #[error("config server returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("failed to decode config server response: {0}")]
    Decode(#[source] reqwest::Error),
}
