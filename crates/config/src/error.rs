// SPDX-License-Identifier: Apache-2.0

//! Validation errors, collected rather than fail-fast (spec §10.3: "return a
//! `Vec<ConfigError>`, not fail on first error"), mirroring
//! `otap-df-config::validation`'s shape.

/// One configuration problem found during [`crate::AgentConfig::validate`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A watermark or limit field violates its required ordering.
    #[error("{field}: {reason}")]
    InvalidField {
        /// Dotted path to the offending field (e.g. `"queues.process.high_watermark"`).
        field: String,
        /// Human-readable explanation.
        reason: String,
    },
    /// A required list (addresses, jobs) was empty.
    #[error("{field} must not be empty")]
    EmptyList {
        /// Dotted path to the offending field.
        field: String,
    },
}
