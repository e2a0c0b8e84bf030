// SPDX-License-Identifier: Apache-2.0

//! Serde-derived configuration for every component in the agent, loaded
//! from YAML (spec §10.3), grounded on `otap-df-config`'s settings-struct
//! shape and validated with a collect-all-errors pass rather than
//! fail-fast, mirroring `otap-df-config::validation`.

mod byte_units;
mod config_client_config;
mod error;
mod limiter_config;
mod queue_config;
mod scrape_config;

pub use config_client_config::ConfigServerClientConfig;
pub use error::ConfigError;
pub use limiter_config::{ConcurrencyLimiterConfig, RetryPolicyConfig};
pub use queue_config::{
    BoundedProcessQueueConfig, BoundedSenderQueueConfig, CircularProcessQueueConfig, ExactlyOnceSenderQueueConfig,
};
pub use scrape_config::{RelabelAction, RelabelRuleConfig, ScrapeJobConfig, ScrapeSchedulerConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP sink / flusher-runner settings not specific to one destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlusherRuntimeConfig {
    /// Global ceiling on in-flight HTTP requests (spec §4.10:
    /// `send_request_concurrency`).
    pub send_request_concurrency: usize,
    /// Interval between housekeeping passes, in seconds (spec: "~10 minutes").
    #[serde(default = "default_housekeeping_interval_secs")]
    pub housekeeping_interval_secs: u64,
    /// Grace period (seconds) a deleted, drained sender queue survives
    /// before GC removes it.
    #[serde(default = "default_gc_grace_secs")]
    pub gc_grace_secs: u64,
}

fn default_housekeeping_interval_secs() -> u64 {
    600
}

fn default_gc_grace_secs() -> u64 {
    60
}

/// Top-level configuration for one agent process. Each named entry is keyed
/// by a pipeline or destination name, matching the `QueueKey` registry's
/// `"config_name-flusher_type-target"` naming convention (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    /// Bounded process queues, keyed by pipeline name.
    #[serde(default)]
    pub bounded_process_queues: HashMap<String, BoundedProcessQueueConfig>,
    /// Circular process queues, keyed by pipeline name.
    #[serde(default)]
    pub circular_process_queues: HashMap<String, CircularProcessQueueConfig>,
    /// Bounded sender queues, keyed by destination name.
    #[serde(default)]
    pub bounded_sender_queues: HashMap<String, BoundedSenderQueueConfig>,
    /// Exactly-once sender queues, keyed by destination name.
    #[serde(default)]
    pub exactly_once_sender_queues: HashMap<String, ExactlyOnceSenderQueueConfig>,
    /// Concurrency limiters, keyed by logical target name.
    #[serde(default)]
    pub concurrency_limiters: HashMap<String, ConcurrencyLimiterConfig>,
    /// Retry policies, keyed by destination name.
    #[serde(default)]
    pub retry_policies: HashMap<String, RetryPolicyConfig>,
    /// Flusher-runner-wide settings.
    pub flusher_runtime: Option<FlusherRuntimeConfig>,
    /// Config-server client settings.
    pub config_client: Option<ConfigServerClientConfig>,
    /// Scrape scheduler settings.
    pub scrape: Option<ScrapeSchedulerConfig>,
}

impl AgentConfig {
    /// Parses `yaml` into an [`AgentConfig`]. Does not validate; call
    /// [`AgentConfig::validate`] separately so callers can decide whether to
    /// proceed with warnings or abort.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Checks every registered section, returning every violation found
    /// rather than stopping at the first (spec §10.3).
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (name, queue) in &self.bounded_process_queues {
            queue.validate(&format!("bounded_process_queues.{name}"), &mut errors);
        }
        for (name, queue) in &self.bounded_sender_queues {
            queue.validate(&format!("bounded_sender_queues.{name}"), &mut errors);
        }
        for (name, queue) in &self.exactly_once_sender_queues {
            queue.validate(&format!("exactly_once_sender_queues.{name}"), &mut errors);
        }
        for (name, limiter) in &self.concurrency_limiters {
            limiter.validate(&format!("concurrency_limiters.{name}"), &mut errors);
        }
        if let Some(config_client) = &self.config_client {
            config_client.validate("config_client", &mut errors);
        }
        if let Some(scrape) = &self.scrape {
            scrape.validate("scrape", &mut errors);
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_has_no_validation_errors() {
        assert!(AgentConfig::default().validate().is_empty());
    }

    #[test]
    fn inverted_watermarks_are_reported() {
        let mut config = AgentConfig::default();
        config.bounded_process_queues.insert(
            "pipeline-a".to_string(),
            BoundedProcessQueueConfig {
                capacity: 10,
                low_watermark: 8,
                high_watermark: 2,
                priority: 0,
                pinned_thread: None,
            },
        );
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn config_server_client_requires_nonempty_addresses() {
        let mut config = AgentConfig::default();
        config.config_client = Some(ConfigServerClientConfig {
            addresses: Vec::new(),
            heartbeat_interval_secs: 10,
            pipeline_config_dir: "/tmp/pipeline".into(),
            instance_config_dir: "/tmp/instance".into(),
            legacy_yaml_dir: None,
            instance_id: "inst-1".to_string(),
            agent_type: "conduit".to_string(),
        });
        let errors = config.validate();
        assert_eq!(errors, vec![ConfigError::EmptyList { field: "config_client.addresses".to_string() }]);
    }

    #[test]
    fn yaml_round_trips_through_from_yaml() {
        let yaml = r#"
bounded_process_queues:
  pipeline-a:
    capacity: 100
    low_watermark: 10
    high_watermark: 80
    priority: 1
"#;
        let config = AgentConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.bounded_process_queues["pipeline-a"].capacity, 100);
        assert!(config.validate().is_empty());
    }
}
