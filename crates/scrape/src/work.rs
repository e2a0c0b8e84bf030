// SPDX-License-Identifier: Apache-2.0

//! `ScrapeWork`: one scrape loop per surviving target (spec §4.13).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conduit_model::{Event, Labels, PipelineEventGroup, ProcessQueueItem};
use conduit_queue::{ProcessQueueOps, QueueOutcome};
use reqwest::Client;
use tracing::warn;

use crate::expo_format;
use crate::target::{initial_offset, resolve_url};

const MAX_PUSH_RETRIES: usize = 1000;
const PUSH_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// One target's scrape loop: fetch, parse, and enqueue on a fixed,
/// target-staggered cadence.
pub struct ScrapeWork {
    client: Client,
    url: String,
    labels: Labels,
    scrape_interval: Duration,
    scrape_timeout: Duration,
    identity_hash: u64,
    queue: Arc<dyn ProcessQueueOps<ProcessQueueItem>>,
    pipeline_generation: u64,
    input_index: usize,
    running: Arc<AtomicBool>,
}

impl ScrapeWork {
    #[must_use]
    pub fn new(
        client: Client,
        labels: Labels,
        scrape_interval: Duration,
        scrape_timeout: Duration,
        identity_hash: u64,
        queue: Arc<dyn ProcessQueueOps<ProcessQueueItem>>,
        pipeline_generation: u64,
        input_index: usize,
        running: Arc<AtomicBool>,
    ) -> Self {
        let url = resolve_url(&labels);
        Self {
            client,
            url,
            labels,
            scrape_interval,
            scrape_timeout,
            identity_hash,
            queue,
            pipeline_generation,
            input_index,
            running,
        }
    }

    /// Runs the scrape loop until `running` is cleared. `scrape_immediately`
    /// skips the initial staggering sleep (spec §4.13: "If the job was
    /// previously registered and its unregister expiry is already past,
    /// scrape immediately first").
    pub async fn run(&self, scrape_immediately: bool) {
        if !scrape_immediately {
            tokio::time::sleep(initial_offset(self.identity_hash, self.scrape_interval)).await;
        }

        while self.running.load(Ordering::Acquire) {
            let tick_start = tokio::time::Instant::now();
            self.scrape_once().await;

            if !self.running.load(Ordering::Acquire) {
                break;
            }
            let elapsed = tick_start.elapsed();
            let sleep_for = aligned_sleep(elapsed, self.scrape_interval);
            tokio::time::sleep(sleep_for).await;
        }
    }

    async fn scrape_once(&self) {
        let response = match self.client.get(&self.url).timeout(self.scrape_timeout).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(url = %self.url, %error, "scrape transport error");
                return;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            warn!(url = %self.url, status = %response.status(), "scrape returned non-200");
            return;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => {
                warn!(url = %self.url, %error, "failed to read scrape body");
                return;
            }
        };

        let samples = expo_format::parse(&body);
        if samples.is_empty() {
            return;
        }

        let mut base_tags = BTreeMap::new();
        for (key, value) in self.labels.iter() {
            let _ = base_tags.insert(key.to_string(), value.to_string());
        }

        let events: Vec<Event> = samples
            .into_iter()
            .map(|sample| {
                let mut tags = BTreeMap::new();
                tags.insert("__name__".to_string(), sample.metric_name);
                for (k, v) in sample.labels {
                    let _ = tags.insert(k, v);
                }
                Event { payload: sample.value.to_string().into_bytes().into(), tags }
            })
            .collect();

        let group = PipelineEventGroup::new(events, base_tags, Arc::from(body.into_bytes().into_boxed_slice()));
        let item = ProcessQueueItem::new(group, self.input_index, self.pipeline_generation);
        self.push_with_retry(item).await;
    }

    async fn push_with_retry(&self, item: ProcessQueueItem) {
        for attempt in 0..MAX_PUSH_RETRIES {
            match self.queue.push(item.clone()) {
                QueueOutcome::Ok => return,
                QueueOutcome::NotFound => {
                    warn!(url = %self.url, "process queue not found, dropping scrape result");
                    return;
                }
                QueueOutcome::Full => {
                    if attempt + 1 == MAX_PUSH_RETRIES {
                        warn!(url = %self.url, "process queue full after max retries, dropping scrape result");
                        return;
                    }
                    tokio::time::sleep(PUSH_RETRY_BACKOFF).await;
                }
            }
        }
    }
}

fn aligned_sleep(elapsed: Duration, interval: Duration) -> Duration {
    if interval.is_zero() {
        return Duration::ZERO;
    }
    let elapsed_ms = elapsed.as_millis() as u64;
    let interval_ms = interval.as_millis().max(1) as u64;
    let remainder = elapsed_ms % interval_ms;
    Duration::from_millis(interval_ms - remainder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_sleep_accounts_for_scrape_duration() {
        let sleep = aligned_sleep(Duration::from_millis(300), Duration::from_secs(1));
        assert_eq!(sleep, Duration::from_millis(700));
    }

    #[test]
    fn aligned_sleep_wraps_when_scrape_overran_one_interval() {
        let sleep = aligned_sleep(Duration::from_millis(1300), Duration::from_secs(1));
        assert_eq!(sleep, Duration::from_millis(700));
    }
}
