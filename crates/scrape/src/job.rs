// SPDX-License-Identifier: Apache-2.0

//! `ScrapeJob`: one target-discovery loop per configured job (spec §4.13).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conduit_config::ScrapeJobConfig;
use conduit_model::{Labels, ProcessQueueItem};
use conduit_queue::ProcessQueueOps;
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::operator_client::OperatorClient;
use crate::relabel;
use crate::target::build_labels;
use crate::work::ScrapeWork;

const DISCOVERY_INTERVAL: Duration = Duration::from_secs(5);

struct RunningTarget {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Drives one job's target-discovery loop, diffing the discovered target
/// set each round and starting/stopping [`ScrapeWork`] loops accordingly.
pub struct ScrapeJob {
    config: ScrapeJobConfig,
    operator: Arc<OperatorClient>,
    http_client: Client,
    queue: Arc<dyn ProcessQueueOps<ProcessQueueItem>>,
    pod_name: String,
    pipeline_generation: u64,
    input_index: usize,
    targets: HashMap<u64, RunningTarget>,
}

impl ScrapeJob {
    #[must_use]
    pub fn new(
        config: ScrapeJobConfig,
        operator: Arc<OperatorClient>,
        pod_name: String,
        queue: Arc<dyn ProcessQueueOps<ProcessQueueItem>>,
        pipeline_generation: u64,
        input_index: usize,
    ) -> Self {
        Self {
            config,
            operator,
            http_client: Client::new(),
            queue,
            pod_name,
            pipeline_generation,
            input_index,
            targets: HashMap::new(),
        }
    }

    /// Runs the discovery loop until `running` is cleared.
    pub async fn run(&mut self, running: Arc<AtomicBool>, user_agent: &str, scrape_immediately: bool) {
        let mut first_round = true;
        while running.load(Ordering::Acquire) {
            self.discover_once(user_agent, scrape_immediately && first_round).await;
            first_round = false;
            tokio::time::sleep(DISCOVERY_INTERVAL).await;
        }

        for (_, target) in self.targets.drain() {
            target.running.store(false, Ordering::Release);
            target.handle.abort();
        }
    }

    async fn discover_once(&mut self, user_agent: &str, scrape_immediately: bool) {
        let groups = match self.operator.targets(&self.config.job_name, &self.pod_name, user_agent).await {
            Ok(groups) => groups,
            Err(error) => {
                tracing::warn!(job = %self.config.job_name, %error, "target discovery request failed");
                return;
            }
        };

        let mut discovered: HashMap<u64, Labels> = HashMap::new();
        for group in groups {
            for address in &group.targets {
                let labels = build_labels(address, &self.config, &group.labels);
                let Some(relabeled) = relabel::apply(labels, &self.config.relabel_configs) else {
                    continue;
                };
                discovered.insert(relabeled.identity_hash(), relabeled);
            }
        }

        for identity in self.targets.keys().copied().collect::<Vec<_>>() {
            if !discovered.contains_key(&identity) {
                if let Some(target) = self.targets.remove(&identity) {
                    debug!(job = %self.config.job_name, identity, "target vanished, stopping scrape loop");
                    target.running.store(false, Ordering::Release);
                    target.handle.abort();
                }
            }
        }

        for (identity, labels) in discovered {
            if self.targets.contains_key(&identity) {
                continue;
            }
            info!(job = %self.config.job_name, identity, "new target, starting scrape loop");
            self.start_target(identity, labels, scrape_immediately);
        }
    }

    fn start_target(&mut self, identity: u64, labels: Labels, scrape_immediately: bool) {
        let running = Arc::new(AtomicBool::new(true));
        let work = ScrapeWork::new(
            self.http_client.clone(),
            labels,
            Duration::from_secs(self.config.scrape_interval_secs),
            Duration::from_secs(self.config.scrape_timeout_secs),
            identity,
            self.queue.clone(),
            self.pipeline_generation,
            self.input_index,
            running.clone(),
        );
        let handle = tokio::spawn(async move {
            work.run(scrape_immediately).await;
        });
        let _ = self.targets.insert(identity, RunningTarget { running, handle });
    }
}
