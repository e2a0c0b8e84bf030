// SPDX-License-Identifier: Apache-2.0

//! Process- and sender-queue capacity/watermark settings (spec
//! §4.2,4.3,4.4,4.5).

use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Settings for one bounded (backpressure) process queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundedProcessQueueConfig {
    /// Maximum item count before push-validity flips off.
    pub capacity: usize,
    /// Pop below this to restore push-validity and fire feedback.
    pub low_watermark: usize,
    /// Push above this to flip push-validity off.
    pub high_watermark: usize,
    /// Round-robin priority level (0 = highest, per spec §4.6's 4 levels).
    pub priority: u8,
    /// Pin this queue to one processing thread, for exactly-once ordering.
    #[serde(default)]
    pub pinned_thread: Option<usize>,
}

/// Settings for one circular (lossy) process queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularProcessQueueConfig {
    /// Maximum total event count held across all queued items.
    pub capacity_events: usize,
    /// Round-robin priority level.
    pub priority: u8,
}

/// Settings for one bounded (ring + overflow) sender queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundedSenderQueueConfig {
    /// Ring capacity.
    pub capacity: usize,
    /// Combined ring+overflow length to restore push-validity below.
    pub low_watermark: usize,
    /// Combined ring+overflow length to flip push-validity off at.
    pub high_watermark: usize,
    /// Optional byte-rate cap, human-readable (e.g. `"2MiB"`).
    #[serde(default, deserialize_with = "crate::byte_units::deserialize")]
    pub max_bytes_per_second: Option<u64>,
}

/// Settings for one exactly-once (fixed-slot) sender queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactlyOnceSenderQueueConfig {
    /// Number of persistent slots (one per shard hash key).
    pub slot_count: usize,
    /// Optional byte-rate cap, human-readable.
    #[serde(default, deserialize_with = "crate::byte_units::deserialize")]
    pub max_bytes_per_second: Option<u64>,
}

impl BoundedProcessQueueConfig {
    pub(crate) fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if !(self.low_watermark <= self.high_watermark && self.high_watermark <= self.capacity) {
            errors.push(ConfigError::InvalidField {
                field: field.to_string(),
                reason: "requires low_watermark <= high_watermark <= capacity".to_string(),
            });
        }
    }
}

impl BoundedSenderQueueConfig {
    pub(crate) fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if !(self.low_watermark <= self.high_watermark && self.high_watermark <= self.capacity) {
            errors.push(ConfigError::InvalidField {
                field: field.to_string(),
                reason: "requires low_watermark <= high_watermark <= capacity".to_string(),
            });
        }
    }
}

impl ExactlyOnceSenderQueueConfig {
    pub(crate) fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if self.slot_count == 0 {
            errors.push(ConfigError::InvalidField {
                field: field.to_string(),
                reason: "slot_count must be at least 1".to_string(),
            });
        }
    }
}
