// SPDX-License-Identifier: Apache-2.0

//! Heartbeat request/response wire types (spec §4.12 item 1), sent as JSON
//! rather than the source's protobuf — grounded on the teacher's
//! `HeartbeatRow`/`Heartbeat::send` shape, adapted to this spec's fields.

use serde::{Deserialize, Serialize};

/// One heartbeat POST body.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    pub request_id: String,
    pub sequence_num: u64,
    pub instance_id: String,
    pub agent_type: String,
    pub attributes: HeartbeatAttributes,
    #[serde(default)]
    pub tags: Vec<String>,
    pub running_status: String,
    pub startup_time: String,
    #[serde(default)]
    pub pipeline_configs: Vec<ConfigStatusReport>,
    #[serde(default)]
    pub instance_configs: Vec<ConfigStatusReport>,
    #[serde(default)]
    pub commands: Vec<String>,
}

/// Host/agent identification attached to every heartbeat.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatAttributes {
    pub hostname: String,
    pub ip: String,
    pub version: String,
    pub os_detail: String,
}

/// Local status of one applied config, reported back so the server can
/// reconcile its view with what actually landed (spec §3).
#[derive(Debug, Clone, Serialize)]
pub struct ConfigStatusReport {
    pub name: String,
    pub version: i64,
    pub status: String,
    pub message: Option<String>,
}

/// The server's heartbeat response.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatResponse {
    /// When `true`, the agent must follow up with a detail-fetch request
    /// rather than trusting the inline `*_config_updates` (spec §4.12 item
    /// 4: "If response flags request detail-fetch...").
    #[serde(default)]
    pub fetch_detail: bool,
    #[serde(default)]
    pub pipeline_config_updates: Vec<ConfigUpdate>,
    #[serde(default)]
    pub instance_config_updates: Vec<ConfigUpdate>,
    /// Tells the client to switch away from the address it just used
    /// (spec §4.12 item 2: address-switch policy).
    #[serde(default)]
    pub switch_address: bool,
}

/// One config change the server wants applied.
///
/// `version == -1` means "delete this config" (spec §4.12 item 5).
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigUpdate {
    pub name: String,
    pub version: i64,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ConfigUpdate {
    /// Whether the control plane is asking for this config to be removed.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.version == -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_update_with_version_negative_one_is_delete() {
        let update = ConfigUpdate { name: "a".to_string(), version: -1, detail: None };
        assert!(update.is_delete());
    }

    #[test]
    fn config_update_with_nonnegative_version_is_not_delete() {
        let update = ConfigUpdate { name: "a".to_string(), version: 3, detail: Some("{}".to_string()) };
        assert!(!update.is_delete());
    }

    #[test]
    fn heartbeat_response_defaults_fetch_detail_and_switch_to_false() {
        let response: HeartbeatResponse = serde_json::from_str("{}").unwrap();
        assert!(!response.fetch_detail);
        assert!(!response.switch_address);
        assert!(response.pipeline_config_updates.is_empty());
    }
}
