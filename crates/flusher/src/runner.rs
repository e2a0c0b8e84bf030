// SPDX-License-Identifier: Apache-2.0

//! Single long-lived task draining ready items from every registered sender
//! queue and dispatching them by sink kind (spec §4.9).

use crate::alarm::{AlarmCategory, AlarmEmitter};
use crate::error_kind::SendOutcome;
use crate::flusher_trait::Flusher;
use crate::http_sink::HttpSink;
use crate::pack_id::PackIdManager;
use crate::retry_policy::{RetryOperation, RetryPolicy};
use conduit_queue_key::QueueKey;
use conduit_sender_queue::{CheckpointHandle, SenderQueueItem, SenderQueueManager};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a [`FlusherRunner`] does with an item once it is popped.
pub enum SinkKind {
    /// Dispatch through an async HTTP sink.
    Http(Arc<HttpSink>),
    /// In-process test sink: settles every item as an immediate success
    /// without a network call (spec §4.9 step 3: "Other (in-process test
    /// sink)").
    Immediate,
}

/// One destination's flusher plus the sink it dispatches through.
pub struct FlusherBinding {
    /// Builds requests and classifies responses for this destination.
    pub flusher: Arc<dyn Flusher>,
    /// How items for this destination are actually sent.
    pub sink: SinkKind,
}

/// Timings governing the runner's drain/housekeeping cadence.
#[derive(Debug, Clone, Copy)]
pub struct FlusherRunnerConfig {
    /// How long a drain tick blocks on the manager's trigger when there is
    /// nothing to pop (spec: "~1s").
    pub poll_timeout: Duration,
    /// Interval between housekeeping passes (spec: "every ~10 minutes").
    pub housekeeping_interval: Duration,
    /// Grace period a marked-deleted, drained sender queue must survive
    /// before the GC sweep removes it.
    pub gc_grace: Duration,
    /// Items requested per destination on each drain tick.
    pub limit_per_queue: usize,
}

impl Default for FlusherRunnerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            housekeeping_interval: Duration::from_secs(600),
            gc_grace: Duration::from_secs(60),
            limit_per_queue: 64,
        }
    }
}

/// Drains [`SenderQueueManager`], dispatching each popped item through its
/// destination's bound sink and applying the resulting retry decision.
pub struct FlusherRunner {
    manager: Arc<SenderQueueManager>,
    retry_policy: Arc<RetryPolicy>,
    alarms: Arc<AlarmEmitter>,
    bindings: HashMap<QueueKey, FlusherBinding>,
    config: FlusherRunnerConfig,
    pack_ids: PackIdManager,
}

impl FlusherRunner {
    /// Creates a runner with no destinations registered yet.
    #[must_use]
    pub fn new(
        manager: Arc<SenderQueueManager>,
        retry_policy: Arc<RetryPolicy>,
        alarms: Arc<AlarmEmitter>,
        config: FlusherRunnerConfig,
    ) -> Self {
        Self {
            manager,
            retry_policy,
            alarms,
            bindings: HashMap::new(),
            config,
            pack_ids: PackIdManager::new(),
        }
    }

    /// The pack-id sequence table this runner GCs during housekeeping.
    /// Exposed so a serializer can mint pack-id suffixes through the same
    /// counters that get periodically cleaned up here.
    #[must_use]
    pub fn pack_ids(&self) -> &PackIdManager {
        &self.pack_ids
    }

    /// Registers (or replaces) the flusher+sink pair serving `destination`.
    pub fn register(&mut self, destination: QueueKey, binding: FlusherBinding) {
        let _ = self.bindings.insert(destination, binding);
    }

    /// Runs the drain loop until `shutdown` is signalled `true`. While
    /// running, honors every queue's limiter protocol; once shut down,
    /// callers that want a full in-flight drain should keep calling
    /// [`FlusherRunner::drain_once`] directly with items this loop no
    /// longer pops (spec §4.9: "if 'full drain' mode, keep draining").
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let span = tracing::info_span!("flusher_runner");
        let _enter = span.enter();
        let mut last_housekeeping = Instant::now();

        while !*shutdown.borrow() {
            let dispatched = self.drain_once().await;

            if dispatched == 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_timeout) => {}
                    _ = shutdown.changed() => {}
                }
            }

            if last_housekeeping.elapsed() >= self.config.housekeeping_interval {
                self.housekeeping();
                last_housekeeping = Instant::now();
            }
        }
    }

    /// One drain tick: pops everything currently available across all
    /// registered destinations, dispatches it, and returns how many items
    /// were popped (spec §4.9 step 2: "if empty, wait").
    pub async fn drain_once(&self) -> usize {
        let items = self.manager.get_all_available_items(self.config.limit_per_queue);
        let count = items.len();
        for (destination, item) in items {
            let Some(binding) = self.bindings.get(&destination) else {
                tracing::warn!(?destination, "popped item for unbound destination");
                continue;
            };
            match &binding.sink {
                SinkKind::Http(sink) => {
                    let sink = Arc::clone(sink);
                    let flusher = Arc::clone(&binding.flusher);
                    let retry_policy = Arc::clone(&self.retry_policy);
                    let manager = Arc::clone(&self.manager);
                    let alarms = Arc::clone(&self.alarms);
                    tokio::spawn(async move {
                        sink.dispatch(flusher, retry_policy, manager, alarms, destination, item).await;
                    });
                }
                SinkKind::Immediate => {
                    apply_outcome(
                        binding.flusher.as_ref(),
                        &self.retry_policy,
                        &self.manager,
                        &self.alarms,
                        destination,
                        &item,
                        SendOutcome::Success,
                    )
                    .await;
                }
            }
        }
        count
    }

    /// Periodic maintenance (spec §4.9 step 4): GC marked-deleted sender
    /// queues that are drained and past their deletion grace, and GC the
    /// pack-id sequence table. Idle HTTP client pruning is left to
    /// `reqwest`'s own pool idle timeout rather than driven explicitly here.
    pub fn housekeeping(&self) {
        self.manager.gc_sweep(self.config.gc_grace);
        self.pack_ids.gc(Instant::now());
        tracing::info!("flusher housekeeping: sender-queue GC sweep, pack-id GC complete");
    }
}

/// Applies a classified [`SendOutcome`] to `item`: commits and removes on
/// success, returns it to `Idle` on retry-later, or removes and alarms on
/// discard. `RetryNow` is reported back to the caller rather than handled
/// here, since it means "send again immediately" — the HTTP sink loops on
/// it directly rather than touching the sender queue.
pub(crate) async fn apply_outcome(
    flusher: &dyn Flusher,
    retry_policy: &RetryPolicy,
    manager: &SenderQueueManager,
    alarms: &AlarmEmitter,
    destination: QueueKey,
    item: &Arc<SenderQueueItem>,
    outcome: SendOutcome,
) -> RetryOperation {
    let creds_advanced = matches!(outcome, SendOutcome::Unauthorized) && flusher.refresh_credentials();
    let now = Instant::now();
    let op = retry_policy.classify(&outcome, item, now, creds_advanced, alarms, flusher.config_name());

    match op {
        RetryOperation::Commit | RetryOperation::CommitAndDiscard => {
            if let Some(CheckpointHandle::Bound(checkpoint)) = item.checkpoint() {
                checkpoint.commit();
                checkpoint.increase_sequence_id();
            }
            if op == RetryOperation::CommitAndDiscard && !flusher.is_profile_or_telemetry(item) {
                alarms.emit(
                    AlarmCategory::Discard,
                    flusher.config_name(),
                    "invalid-sequence-id treated as hash-key collision",
                    now,
                );
            }
            let _ = manager.remove(destination, item);
        }
        RetryOperation::RetryLater => {
            item.mark_retry_later();
        }
        RetryOperation::Discard => {
            if !flusher.is_profile_or_telemetry(item) {
                alarms.emit(AlarmCategory::Discard, flusher.config_name(), "discarded by retry policy", now);
            }
            let _ = manager.remove(destination, item);
        }
        RetryOperation::RetryNow => {}
    }

    op
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flusher_trait::HttpRequestSpec;
    use bytes::Bytes;
    use conduit_queue_key::QueueKeyRegistry;
    use conduit_sender_queue::{BoundedSenderQueue, SenderQueueManager};

    struct StubFlusher {
        name: String,
        response: SendOutcome,
    }

    impl Flusher for StubFlusher {
        fn build_request(&self, _item: &Arc<SenderQueueItem>) -> HttpRequestSpec {
            unreachable!("stub flusher's sink never calls build_request")
        }

        fn classify_response(&self, _status: reqwest::StatusCode, _body: &[u8]) -> SendOutcome {
            self.response.clone()
        }

        fn config_name(&self) -> &str {
            &self.name
        }
    }

    #[tokio::test]
    async fn immediate_sink_commits_and_removes_on_success() {
        let registry = QueueKeyRegistry::new();
        let destination = registry.get_key("dest-a");
        let manager = Arc::new(SenderQueueManager::new());
        let queue = Arc::new(BoundedSenderQueue::new(4, 1, 4, None, Vec::new()));
        manager.create_or_update(destination, queue);

        let item = Arc::new(SenderQueueItem::new(Bytes::from_static(b"payload"), 7, 1, destination));
        assert_eq!(manager.push(destination, Arc::clone(&item)), conduit_queue::QueueOutcome::Ok);

        let mut runner = FlusherRunner::new(
            Arc::clone(&manager),
            Arc::new(RetryPolicy::new(RetryPolicyConfig::default())),
            Arc::new(AlarmEmitter::new(Duration::from_secs(60))),
            FlusherRunnerConfig::default(),
        );
        runner.register(
            destination,
            FlusherBinding {
                flusher: Arc::new(StubFlusher {
                    name: "dest-a".to_string(),
                    response: SendOutcome::Success,
                }),
                sink: SinkKind::Immediate,
            },
        );

        let dispatched = runner.drain_once().await;
        assert_eq!(dispatched, 1);
        assert!(manager.get_all_available_items(4).is_empty(), "item should have been removed");
    }

    #[tokio::test]
    async fn apply_outcome_returns_item_to_idle_on_retry_later() {
        let registry = QueueKeyRegistry::new();
        let destination = registry.get_key("dest-b");
        let manager = SenderQueueManager::new();
        let queue = Arc::new(BoundedSenderQueue::new(4, 1, 4, None, Vec::new()));
        manager.create_or_update(destination, queue);

        let item = Arc::new(SenderQueueItem::new(Bytes::from_static(b"payload"), 7, 1, destination));
        assert_eq!(manager.push(destination, Arc::clone(&item)), conduit_queue::QueueOutcome::Ok);
        let _ = manager.get_all_available_items(4); // pop, flips status to Sending

        let flusher = StubFlusher {
            name: "dest-b".to_string(),
            response: SendOutcome::NetworkOrServerError { buffer_or_not: true },
        };
        let retry_policy = RetryPolicy::new(RetryPolicyConfig::default());
        let alarms = AlarmEmitter::new(Duration::from_secs(60));

        let op = apply_outcome(
            &flusher,
            &retry_policy,
            &manager,
            &alarms,
            destination,
            &item,
            SendOutcome::NetworkOrServerError { buffer_or_not: true },
        )
        .await;

        assert_eq!(op, RetryOperation::RetryLater);
        assert_eq!(item.status(), conduit_sender_queue::SendStatus::Idle);
        assert_eq!(manager.get_all_available_items(4).len(), 1, "retry-later item should be re-poppable");
    }

    #[test]
    fn housekeeping_gcs_both_sender_queues_and_pack_ids() {
        let manager = Arc::new(SenderQueueManager::new());
        let runner = FlusherRunner::new(
            manager,
            Arc::new(RetryPolicy::new(RetryPolicyConfig::default())),
            Arc::new(AlarmEmitter::new(Duration::from_secs(60))),
            FlusherRunnerConfig::default(),
        );

        let _ = runner.pack_ids().next_sequence(1, Instant::now());
        assert_eq!(runner.pack_ids().len(), 1);

        runner.housekeeping();
        assert_eq!(runner.pack_ids().len(), 1, "a freshly touched key survives housekeeping");
    }
}
