// SPDX-License-Identifier: Apache-2.0

//! Top-level scrape scheduler: owns the operator client, registers this
//! collector, and runs one [`ScrapeJob`] loop per configured job (spec
//! §4.13).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use conduit_config::ScrapeSchedulerConfig;
use conduit_model::ProcessQueueItem;
use conduit_queue::ProcessQueueOps;
use tokio::task::JoinHandle;
use tracing::info;

use crate::job::ScrapeJob;
use crate::operator_client::OperatorClient;

/// Runs every configured [`ScrapeJob`], registering/unregistering this
/// collector with the operator around the run.
pub struct ScrapeScheduler {
    config: ScrapeSchedulerConfig,
    operator: Arc<OperatorClient>,
    running: Arc<AtomicBool>,
}

impl ScrapeScheduler {
    #[must_use]
    pub fn new(config: ScrapeSchedulerConfig) -> Self {
        let operator = Arc::new(OperatorClient::new(&config.operator_host, config.operator_port));
        Self { config, operator, running: Arc::new(AtomicBool::new(true)) }
    }

    /// Signal used to stop every job/work loop.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Registers with the operator, runs every job's discovery loop to
    /// completion (i.e. until `stop_handle` is cleared), then unregisters.
    ///
    /// `queue_for` resolves the destination process queue for one job by
    /// name; `user_agent` is the fully-rendered heartbeat user-agent string
    /// shared with the config-server client.
    pub async fn run<F>(&self, queue_for: F, user_agent: &str, pipeline_generation: u64)
    where
        F: Fn(&str) -> Arc<dyn ProcessQueueOps<ProcessQueueItem>>,
    {
        let unregister_deadline_ms = self.operator.register_collector(&self.config.pod_name).await;
        info!(deadline_ms = unregister_deadline_ms, "collector registered with operator");
        let scrape_immediately = now_ms() >= unregister_deadline_ms;

        let handles: Vec<JoinHandle<()>> = self
            .config
            .jobs
            .iter()
            .enumerate()
            .map(|(input_index, job_config)| {
                let operator = self.operator.clone();
                let pod_name = self.config.pod_name.clone();
                let queue = queue_for(&job_config.job_name);
                let mut job = ScrapeJob::new(
                    job_config.clone(),
                    operator,
                    pod_name,
                    queue,
                    pipeline_generation,
                    input_index,
                );
                let running = self.running.clone();
                let user_agent = user_agent.to_string();
                tokio::spawn(async move {
                    let mut job = job;
                    job.run(running, &user_agent, scrape_immediately).await;
                })
            })
            .collect();

        for handle in handles {
            let _ = handle.await;
        }

        self.operator.unregister_collector(&self.config.pod_name).await;
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}
