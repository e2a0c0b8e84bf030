// SPDX-License-Identifier: Apache-2.0

//! Config-server heartbeat client settings (spec §4.12).

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for one config-server client worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigServerClientConfig {
    /// Candidate config-server addresses; one is selected per heartbeat
    /// (spec: "pick a configserver address").
    pub addresses: Vec<String>,
    /// Heartbeat period in seconds (spec default: 10).
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Directory persisted pipeline configs are written to.
    pub pipeline_config_dir: PathBuf,
    /// Directory persisted instance configs are written to.
    pub instance_config_dir: PathBuf,
    /// Legacy YAML config directory watched by modification time, if any
    /// (spec §6: "Legacy YAML configs ... watched by modification time").
    #[serde(default)]
    pub legacy_yaml_dir: Option<PathBuf>,
    /// Stable identifier for this agent instance.
    pub instance_id: String,
    /// Reported agent type/product name.
    pub agent_type: String,
}

fn default_heartbeat_interval_secs() -> u64 {
    10
}

impl ConfigServerClientConfig {
    pub(crate) fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if self.addresses.is_empty() {
            errors.push(ConfigError::EmptyList {
                field: format!("{field}.addresses"),
            });
        }
        if self.heartbeat_interval_secs == 0 {
            errors.push(ConfigError::InvalidField {
                field: format!("{field}.heartbeat_interval_secs"),
                reason: "must be at least 1".to_string(),
            });
        }
    }
}
