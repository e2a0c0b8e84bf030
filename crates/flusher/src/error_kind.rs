// SPDX-License-Identifier: Apache-2.0

//! Classification of a completed send attempt, matching the error taxonomy
//! (spec §7) that feeds the retry table (spec §4.11).

/// What a [`crate::flusher_trait::Flusher`] made of a completed (or failed)
/// send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Status 200 (or sink-specific success code).
    Success,
    /// Transport failure (DNS, connect, TLS, timeout) or a 5xx response.
    /// `buffer_or_not` reflects the destination's own guidance on whether
    /// the item is worth keeping for a retry.
    NetworkOrServerError {
        /// `true` if the item should be retried later rather than dropped.
        buffer_or_not: bool,
    },
    /// 4xx carrying a quota-exceeded error code (shard or project level).
    QuotaExceeded,
    /// 4xx carrying an authentication/authorization error code.
    Unauthorized,
    /// 4xx carrying an invalid-sequence-id error code; exactly-once
    /// pipelines only, treated as a hash-key collision.
    InvalidSequenceId,
    /// Response indicates the sender's clock has drifted past the
    /// destination's tolerance. Only distinguished from `Unknown` when
    /// time-sync is enabled for this flusher.
    RequestTimeExpired,
    /// Malformed payload, unrecognized error code, or anything else the
    /// flusher doesn't have a specific classification for.
    Unknown,
}

/// Errors raised by crate-level construction steps (spec §9: "move
/// network/HTTP initialization into an explicit `init() -> result` step
/// separate from object construction").
#[derive(Debug, thiserror::Error)]
pub enum FlusherError {
    /// The underlying `reqwest::Client` could not be built.
    #[error("failed to build HTTP client: {0}")]
    ClientInit(#[from] reqwest::Error),
}
