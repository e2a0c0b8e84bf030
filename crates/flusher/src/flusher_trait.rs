// SPDX-License-Identifier: Apache-2.0

//! The per-destination contract a sink dispatches through: serializing a
//! queued item into a wire request and classifying what came back.

use crate::error_kind::SendOutcome;
use conduit_sender_queue::SenderQueueItem;
use std::sync::Arc;

/// An outbound HTTP request built from a [`SenderQueueItem`], opaque to the
/// sink beyond what `reqwest` needs to dispatch it.
#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    /// HTTP method (almost always `POST`).
    pub method: reqwest::Method,
    /// Full request URL.
    pub url: String,
    /// Extra headers beyond what `reqwest` sets automatically.
    pub headers: Vec<(String, String)>,
    /// Request body — the item's (already compressed) payload.
    pub body: bytes::Bytes,
}

/// Implemented once per destination kind (log ingestion, metrics push,
/// ...). The flusher runner and HTTP sink call into this to build requests
/// and to turn a raw response into a [`SendOutcome`] the retry policy can
/// act on.
pub trait Flusher: Send + Sync {
    /// Serializes `item` into a request this flusher's destination expects.
    fn build_request(&self, item: &Arc<SenderQueueItem>) -> HttpRequestSpec;

    /// Parses a completed HTTP response into a [`SendOutcome`] (spec §4.11:
    /// "specific error-code strings in the response body are mapped to the
    /// retry-policy table").
    fn classify_response(&self, status: reqwest::StatusCode, body: &[u8]) -> SendOutcome;

    /// Attempts a credential refresh, reporting whether it produced newer
    /// credentials than those used for the failed attempt (spec §4.11:
    /// "unauthorized otherwise"). Flushers with no notion of refreshable
    /// credentials (e.g. static API keys) should return `false`.
    fn refresh_credentials(&self) -> bool {
        false
    }

    /// `true` if `item` should be exempted from alarm reporting on discard
    /// (spec §4.11: "report alarm unless item is profile/telemetry").
    fn is_profile_or_telemetry(&self, item: &Arc<SenderQueueItem>) -> bool {
        let _ = item;
        false
    }

    /// Stable name used for alarm/log attribution and metrics.
    fn config_name(&self) -> &str;
}
