// SPDX-License-Identifier: Apache-2.0

//! Concurrency-limiter and retry-policy settings (spec §4.7,4.11).

use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// AIMD concurrency limiter bounds (spec §4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConcurrencyLimiterConfig {
    /// Limit used at construction.
    pub initial_limit: usize,
    /// Floor the limit decays to on repeated failure.
    pub min_limit: usize,
    /// Ceiling the limit grows to on success.
    pub max_limit: usize,
}

impl Default for ConcurrencyLimiterConfig {
    fn default() -> Self {
        Self {
            initial_limit: 8,
            min_limit: 1,
            max_limit: 256,
        }
    }
}

impl ConcurrencyLimiterConfig {
    pub(crate) fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if !(self.min_limit <= self.initial_limit && self.initial_limit <= self.max_limit) {
            errors.push(ConfigError::InvalidField {
                field: field.to_string(),
                reason: "requires min_limit <= initial_limit <= max_limit".to_string(),
            });
        }
    }
}

/// Retry-classification thresholds (spec §4.11).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    /// Above this try count, `Unauthorized` is discarded instead of retried.
    pub unauth_max: u32,
    /// Above this try count, `Unknown` is discarded instead of retried.
    pub unknown_max: u32,
    /// Items older than this (seconds since enqueue) are discarded
    /// regardless of classification (spec: "e.g. 6h").
    pub discard_fail_interval_secs: u64,
    /// Whether this destination is time-sync aware.
    pub time_sync_enabled: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            unauth_max: 3,
            unknown_max: 5,
            discard_fail_interval_secs: 6 * 3600,
            time_sync_enabled: true,
        }
    }
}
