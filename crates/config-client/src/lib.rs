// SPDX-License-Identifier: Apache-2.0

//! Config-server heartbeat client: builds and sends periodic heartbeats,
//! applies the config updates that come back, classifies the deployment
//! environment for the reported user-agent, and optionally watches a
//! legacy YAML config directory (spec §4.12, §6).

mod address_selector;
mod client;
mod env_class;
mod error;
mod heartbeat;
mod host_attributes;
mod legacy_yaml;

pub use address_selector::AddressSelector;
pub use client::{ConfigFeedbackSink, ConfigServerClient, ConfigServerClientConfig};
pub use env_class::{build_user_agent, classify, current_process_env, EnvironmentClass};
pub use error::HeartbeatError;
pub use heartbeat::{
    ConfigStatusReport, ConfigUpdate, HeartbeatAttributes, HeartbeatRequest, HeartbeatResponse,
};
pub use legacy_yaml::LegacyYamlWatcher;
