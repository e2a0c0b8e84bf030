// SPDX-License-Identifier: Apache-2.0

//! Builds every long-running component from an [`AgentConfig`] and drives
//! them until the caller's shutdown future resolves. A stand-in for the
//! external lifecycle manager spec.md §1 scopes out.

use std::sync::Arc;
use std::time::Duration;

use conduit_config::AgentConfig;
use conduit_flusher::{
    AlarmEmitter, Flusher, FlusherBinding, FlusherRunner, FlusherRunnerConfig, HttpRequestSpec, RetryPolicy,
    RetryPolicyConfig as FlusherRetryPolicyConfig, SendOutcome, SinkKind,
};
use conduit_queue_key::QueueKeyRegistry;
use conduit_sender_queue::{
    BoundedSenderQueue, ExactlyOnceSenderQueue, SenderQueueItem, SenderQueueManager, SenderQueueOps,
};

/// A flusher that always reports success, standing in for the
/// destination-specific wire formats (log ingestion, metrics push) spec.md
/// leaves to a concrete backend (§13 non-goals: parsing/processing
/// plugins). Proves the runner/sink wiring without a real endpoint.
struct PassthroughFlusher {
    name: String,
}

impl Flusher for PassthroughFlusher {
    fn build_request(&self, item: &Arc<SenderQueueItem>) -> HttpRequestSpec {
        HttpRequestSpec {
            method: reqwest::Method::POST,
            url: format!("http://localhost/ingest/{}", self.name),
            headers: Vec::new(),
            body: item.payload.clone(),
        }
    }

    fn classify_response(&self, _status: reqwest::StatusCode, _body: &[u8]) -> SendOutcome {
        SendOutcome::Success
    }

    fn config_name(&self) -> &str {
        &self.name
    }
}

/// Wires every configured component and runs until `shutdown` resolves.
pub async fn run_until_shutdown(config: AgentConfig, shutdown: impl std::future::Future<Output = ()>) {
    let registry = Arc::new(QueueKeyRegistry::new());
    let sender_manager = Arc::new(SenderQueueManager::new());

    for (name, queue_config) in &config.bounded_sender_queues {
        let key = registry.get_key(name);
        let queue: Arc<dyn SenderQueueOps> = Arc::new(BoundedSenderQueue::new(
            queue_config.capacity,
            queue_config.low_watermark,
            queue_config.high_watermark,
            None,
            Vec::new(),
        ));
        sender_manager.create_or_update(key, queue);
    }
    for (name, queue_config) in &config.exactly_once_sender_queues {
        let key = registry.get_key(name);
        let hash_keys: Vec<String> = (0..queue_config.slot_count).map(|slot| slot.to_string()).collect();
        let queue: Arc<dyn SenderQueueOps> =
            Arc::new(ExactlyOnceSenderQueue::new(hash_keys, 0, None, Vec::new()));
        sender_manager.create_or_update(key, queue);
    }

    let retry_policy = Arc::new(RetryPolicy::new(
        config
            .retry_policies
            .values()
            .next()
            .map(|policy_config| FlusherRetryPolicyConfig {
                unauth_max: policy_config.unauth_max,
                unknown_max: policy_config.unknown_max,
                discard_fail_interval: Duration::from_secs(policy_config.discard_fail_interval_secs),
                time_sync_enabled: policy_config.time_sync_enabled,
            })
            .unwrap_or_default(),
    ));
    let alarms = Arc::new(AlarmEmitter::new(Duration::from_secs(10)));

    let runner_config = config.flusher_runtime.as_ref().map_or_else(FlusherRunnerConfig::default, |runtime| {
        FlusherRunnerConfig {
            housekeeping_interval: Duration::from_secs(runtime.housekeeping_interval_secs),
            gc_grace: Duration::from_secs(runtime.gc_grace_secs),
            ..FlusherRunnerConfig::default()
        }
    });

    let mut runner = FlusherRunner::new(Arc::clone(&sender_manager), Arc::clone(&retry_policy), Arc::clone(&alarms), runner_config);
    let destinations: Vec<String> =
        config.bounded_sender_queues.keys().chain(config.exactly_once_sender_queues.keys()).cloned().collect();
    for name in destinations {
        let key = registry.get_key(&name);
        runner.register(
            key,
            FlusherBinding { flusher: Arc::new(PassthroughFlusher { name }), sink: SinkKind::Immediate },
        );
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let runner_handle = tokio::spawn(async move {
        runner.run(shutdown_rx).await;
    });

    let config_client_handle = config.config_client.clone().map(|client_config| {
        tokio::spawn(async move {
            run_config_client(client_config).await;
        })
    });

    let scrape_handle = config.scrape.clone().map(|scrape_config| {
        let scheduler = Arc::new(conduit_scrape::ScrapeScheduler::new(scrape_config));
        let stop = scheduler.stop_handle();
        let join = tokio::spawn(async move {
            // Hooking a scrape job's destination process queue requires the
            // pipeline layer (pipeline name -> queue routing), which lives
            // outside this thin entrypoint; wiring it through is future work.
            scheduler
                .run(
                    |_job_name| unreachable!("scrape destination routing is owned by the pipeline layer"),
                    "conduit-agent",
                    0,
                )
                .await;
        });
        (stop, join)
    });

    shutdown.await;
    tracing::info!("shutdown signal received, stopping workers");

    let _ = shutdown_tx.send(true);
    let _ = runner_handle.await;

    if let Some(handle) = config_client_handle {
        handle.abort();
    }
    if let Some((stop, handle)) = scrape_handle {
        stop.store(false, std::sync::atomic::Ordering::Release);
        handle.abort();
    }
}

/// Drives the heartbeat loop for the lifetime of the agent process (spec
/// §4.12 items 1-5): startup re-registration, then heartbeat / apply /
/// sleep, forever. Detail fetches (when a heartbeat response asks for them)
/// go to `<address>/config_detail?name=<name>` on the address the
/// heartbeat that requested them used — spec.md §6 names the discovery
/// endpoints but leaves this one's exact shape unspecified.
async fn run_config_client(client_config: conduit_config::ConfigServerClientConfig) {
    let mut legacy_watcher = client_config
        .legacy_yaml_dir
        .clone()
        .map(|legacy_dir| conduit_config_client::LegacyYamlWatcher::new(legacy_dir, client_config.pipeline_config_dir.clone()));

    let config = conduit_config_client::ConfigServerClientConfig {
        instance_id: client_config.instance_id,
        agent_type: client_config.agent_type,
        pipeline_config_dir: client_config.pipeline_config_dir,
        instance_config_dir: client_config.instance_config_dir,
        heartbeat_interval: Duration::from_secs(client_config.heartbeat_interval_secs),
        custom_user_agent_suffix: None,
    };

    let client = match conduit_config_client::ConfigServerClient::new(client_config.addresses, config) {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(%error, "failed to build config-server client, heartbeat loop disabled");
            return;
        }
    };

    let (mut pipeline_reports, mut instance_reports) = match client.startup_scan() {
        Ok(reports) => reports,
        Err(error) => {
            tracing::warn!(%error, "failed to scan persisted configs at startup");
            (Vec::new(), Vec::new())
        }
    };

    let detail_client = reqwest::Client::new();
    loop {
        if let Some(watcher) = legacy_watcher.as_mut() {
            match watcher.scan_once() {
                Ok(changed) if !changed.is_empty() => {
                    tracing::info!(?changed, "imported legacy YAML configs");
                }
                Ok(_) => {}
                Err(error) => tracing::warn!(%error, "legacy YAML scan failed"),
            }
        }

        match client.send_heartbeat(pipeline_reports.clone(), instance_reports.clone()).await {
            Ok(response) => {
                let address = client.current_address().to_string();
                let fetch_detail = |name: &str| {
                    let url = format!("{}/config_detail?name={name}", address.trim_end_matches('/'));
                    let detail_client = detail_client.clone();
                    async move {
                        detail_client
                            .get(&url)
                            .send()
                            .await
                            .map_err(conduit_config_client::HeartbeatError::Network)?
                            .text()
                            .await
                            .map_err(conduit_config_client::HeartbeatError::Network)
                    }
                };
                if let Err(error) = client.apply_response(response, fetch_detail).await {
                    tracing::warn!(%error, "failed to apply config update to disk");
                }
                pipeline_reports = Vec::new();
                instance_reports = Vec::new();
            }
            Err(error) => {
                tracing::warn!(%error, "heartbeat failed");
            }
        }
        client.sleep_until_next_heartbeat().await;
    }
}
