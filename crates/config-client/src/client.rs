// SPDX-License-Identifier: Apache-2.0

//! The heartbeat worker loop (spec §4.12): build a heartbeat, POST it to a
//! selected config-server address, apply whatever config changes come
//! back, and repeat on a fixed interval. Grounded on the teacher's
//! `Heartbeat::send` request/response handling, generalized from a single
//! fixed endpoint to the spec's address-pool-with-switch policy.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use conduit_model::{ConfigInfo, ConfigStatus};
use rand::Rng;
use reqwest::Client;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::address_selector::AddressSelector;
use crate::env_class::{build_user_agent, classify, current_process_env};
use crate::error::HeartbeatError;
use crate::heartbeat::{ConfigStatusReport, ConfigUpdate, HeartbeatAttributes, HeartbeatRequest, HeartbeatResponse};
use crate::host_attributes;

/// Reports the local outcome of applying one config change, fed back into
/// the next heartbeat's `pipeline_configs`/`instance_configs` (spec §3).
pub trait ConfigFeedbackSink: Send + Sync {
    fn report(&self, report: ConfigStatusReport);
}

/// Wiring for one heartbeat worker.
pub struct ConfigServerClientConfig {
    pub instance_id: String,
    pub agent_type: String,
    pub pipeline_config_dir: PathBuf,
    pub instance_config_dir: PathBuf,
    pub heartbeat_interval: Duration,
    pub custom_user_agent_suffix: Option<String>,
}

/// The heartbeat client worker: owns the address pool, the sequence
/// counter, and the HTTP client used to talk to the config server.
pub struct ConfigServerClient {
    client: Client,
    addresses: AddressSelector,
    config: ConfigServerClientConfig,
    sequence: AtomicU64,
    startup_time: String,
}

impl ConfigServerClient {
    /// Builds a new client, with connection pooling settings mirroring the
    /// teacher's `Heartbeat::new` (`http1_only`, bounded idle pool, TCP
    /// no-delay for low-latency small POSTs).
    pub fn new(addresses: Vec<String>, config: ConfigServerClientConfig) -> Result<Self, HeartbeatError> {
        let client = Client::builder()
            .http1_only()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(HeartbeatError::BuildClient)?;

        Ok(Self {
            client,
            addresses: AddressSelector::new(addresses),
            config,
            sequence: AtomicU64::new(0),
            startup_time: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Scans `pipeline_config_dir` and `instance_config_dir` at startup,
    /// re-registering every `<name>.json` found with status `APPLYING` so
    /// the first heartbeat reports accurate local state (spec §4.12:
    /// "on startup, scan the config dir and re-register every existing
    /// config as APPLYING").
    pub fn startup_scan(&self) -> std::io::Result<(Vec<ConfigStatusReport>, Vec<ConfigStatusReport>)> {
        let pipeline = scan_dir_as_applying(&self.config.pipeline_config_dir)?;
        let instance = scan_dir_as_applying(&self.config.instance_config_dir)?;
        Ok((pipeline, instance))
    }

    /// The config-server address the next heartbeat (or detail fetch) will
    /// target.
    #[must_use]
    pub fn current_address(&self) -> &str {
        self.addresses.current()
    }

    fn user_agent(&self) -> String {
        let env = classify(&current_process_env());
        build_user_agent(
            &self.config.agent_type,
            host_attributes::version().as_str(),
            host_attributes::os_detail().as_str(),
            host_attributes::outbound_ip().as_str(),
            env,
            self.config.custom_user_agent_suffix.as_deref(),
        )
    }

    fn build_request(
        &self,
        pipeline_configs: Vec<ConfigStatusReport>,
        instance_configs: Vec<ConfigStatusReport>,
    ) -> HeartbeatRequest {
        HeartbeatRequest {
            request_id: Uuid::new_v4().to_string(),
            sequence_num: self.sequence.fetch_add(1, Ordering::Relaxed),
            instance_id: self.config.instance_id.clone(),
            agent_type: self.config.agent_type.clone(),
            attributes: HeartbeatAttributes {
                hostname: host_attributes::hostname(),
                ip: host_attributes::outbound_ip(),
                version: host_attributes::version(),
                os_detail: host_attributes::os_detail(),
            },
            tags: Vec::new(),
            running_status: "RUNNING".to_string(),
            startup_time: self.startup_time.clone(),
            pipeline_configs,
            instance_configs,
            commands: Vec::new(),
        }
    }

    /// Sends one heartbeat to the currently selected address and applies
    /// the response (spec §4.12 items 2-5).
    pub async fn send_heartbeat(
        &self,
        pipeline_configs: Vec<ConfigStatusReport>,
        instance_configs: Vec<ConfigStatusReport>,
    ) -> Result<HeartbeatResponse, HeartbeatError> {
        let request = self.build_request(pipeline_configs, instance_configs);
        let address = self.addresses.current().to_string();
        let url = format!("{}/heartbeat", address.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("User-Agent", self.user_agent())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(HeartbeatError::Network)?;

        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            let error = match status {
                401 => HeartbeatError::Unauthorized(body),
                403 => HeartbeatError::Forbidden(body),
                413 => HeartbeatError::PayloadTooLarge,
                429 => HeartbeatError::RateLimited { retry_after },
                500..=599 => HeartbeatError::ServerError { status, body, retry_after },
                _ => HeartbeatError::UnexpectedStatus { status, body },
            };
            self.addresses.switch();
            return Err(error);
        }

        let parsed: HeartbeatResponse = response.json().await.map_err(HeartbeatError::Decode)?;
        if parsed.switch_address {
            self.addresses.switch();
        }
        Ok(parsed)
    }

    /// Applies every config update in a heartbeat response, fetching detail
    /// separately first if the server asked for it (spec §4.12 item 4).
    ///
    /// `fetch_detail` is invoked once per config named in the response when
    /// `response.fetch_detail` is set; it is expected to return the raw
    /// JSON detail body for that config name.
    pub async fn apply_response<F, Fut>(
        &self,
        response: HeartbeatResponse,
        mut fetch_detail: F,
    ) -> std::io::Result<()>
    where
        F: FnMut(&str) -> Fut,
        Fut: std::future::Future<Output = Result<String, HeartbeatError>>,
    {
        apply_updates(&response.pipeline_config_updates, &self.config.pipeline_config_dir, response.fetch_detail, &mut fetch_detail).await?;
        apply_updates(&response.instance_config_updates, &self.config.instance_config_dir, response.fetch_detail, &mut fetch_detail).await?;
        Ok(())
    }

    /// Jittered sleep before the next heartbeat, so many agents started
    /// simultaneously don't all hit the config server in lockstep.
    pub async fn sleep_until_next_heartbeat(&self) {
        let jitter_ms = rand::thread_rng().gen_range(0..250);
        tokio::time::sleep(self.config.heartbeat_interval + Duration::from_millis(jitter_ms)).await;
    }
}

async fn apply_updates<F, Fut>(
    updates: &[ConfigUpdate],
    dir: &Path,
    should_fetch_detail: bool,
    fetch_detail: &mut F,
) -> std::io::Result<()>
where
    F: FnMut(&str) -> Fut,
    Fut: std::future::Future<Output = Result<String, HeartbeatError>>,
{
    for update in updates {
        if update.is_delete() {
            ConfigInfo::remove_persisted(dir, &update.name)?;
            info!(config = %update.name, "config deleted by control plane");
            continue;
        }

        let detail = if should_fetch_detail || update.detail.is_none() {
            match fetch_detail(&update.name).await {
                Ok(detail) => detail,
                Err(error) => {
                    warn!(config = %update.name, %error, "failed to fetch config detail, skipping");
                    continue;
                }
            }
        } else {
            update.detail.clone().unwrap_or_default()
        };

        let info = ConfigInfo {
            name: update.name.clone(),
            version: update.version,
            status: ConfigStatus::Applying,
            detail,
            message: None,
        };
        info.persist_atomically(dir)?;
        debug!(config = %update.name, version = update.version, "config applied");
    }
    Ok(())
}

fn scan_dir_as_applying(dir: &Path) -> std::io::Result<Vec<ConfigStatusReport>> {
    let mut reports = Vec::new();
    if !dir.exists() {
        return Ok(reports);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Ok(info) = ConfigInfo::load(dir, stem) {
            reports.push(ConfigStatusReport {
                name: info.name,
                version: info.version,
                status: "APPLYING".to_string(),
                message: None,
            });
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_model::ConfigStatus as ModelConfigStatus;

    fn test_config(dir: &Path) -> ConfigServerClientConfig {
        ConfigServerClientConfig {
            instance_id: "inst-1".to_string(),
            agent_type: "conduit-agent".to_string(),
            pipeline_config_dir: dir.join("pipeline"),
            instance_config_dir: dir.join("instance"),
            heartbeat_interval: Duration::from_secs(10),
            custom_user_agent_suffix: None,
        }
    }

    #[test]
    fn startup_scan_is_empty_when_dirs_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let client = ConfigServerClient::new(vec!["http://127.0.0.1:9".to_string()], test_config(tmp.path())).unwrap();
        let (pipeline, instance) = client.startup_scan().unwrap();
        assert!(pipeline.is_empty());
        assert!(instance.is_empty());
    }

    #[test]
    fn startup_scan_reregisters_existing_configs_as_applying() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        std::fs::create_dir_all(&config.pipeline_config_dir).unwrap();
        let info = ConfigInfo {
            name: "job-a".to_string(),
            version: 4,
            status: ModelConfigStatus::Applying,
            detail: "{}".to_string(),
            message: None,
        };
        info.persist_atomically(&config.pipeline_config_dir).unwrap();

        let client = ConfigServerClient::new(vec!["http://127.0.0.1:9".to_string()], config).unwrap();
        let (pipeline, _instance) = client.startup_scan().unwrap();
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline[0].name, "job-a");
        assert_eq!(pipeline[0].version, 4);
        assert_eq!(pipeline[0].status, "APPLYING");
    }

    #[tokio::test]
    async fn apply_updates_removes_config_on_delete_version() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("pipeline");
        std::fs::create_dir_all(&dir).unwrap();
        let info = ConfigInfo {
            name: "job-b".to_string(),
            version: 1,
            status: ModelConfigStatus::Applying,
            detail: "{}".to_string(),
            message: None,
        };
        info.persist_atomically(&dir).unwrap();

        let updates = vec![ConfigUpdate { name: "job-b".to_string(), version: -1, detail: None }];
        apply_updates(&updates, &dir, false, &mut |_: &str| async { Ok::<String, HeartbeatError>(String::new()) })
            .await
            .unwrap();

        assert!(!dir.join("job-b.json").exists());
    }

    #[tokio::test]
    async fn apply_updates_persists_inline_detail_without_fetching() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("pipeline");

        let updates =
            vec![ConfigUpdate { name: "job-c".to_string(), version: 2, detail: Some(r#"{"a":1}"#.to_string()) }];
        let mut fetch_called = false;
        apply_updates(&updates, &dir, false, &mut |_: &str| {
            fetch_called = true;
            async { Ok::<String, HeartbeatError>(String::new()) }
        })
        .await
        .unwrap();

        assert!(!fetch_called);
        assert!(dir.join("job-c.json").exists());
    }
}
