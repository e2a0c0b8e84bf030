// SPDX-License-Identifier: Apache-2.0

//! Per-flusher retry classification: the ordered, first-match-wins table in
//! spec §4.11, grounded on the backoff-decision shape of
//! `otap-df-otap::experimental::retry_processor` generalized from a single
//! exponential-backoff schedule to the full error-taxonomy table.

use crate::alarm::{AlarmCategory, AlarmEmitter};
use crate::error_kind::SendOutcome;
use conduit_sender_queue::SenderQueueItem;
use std::time::{Duration, Instant};

/// What the flusher runner should do with an item once a [`SendOutcome`]
/// has been classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOperation {
    /// Commit the checkpoint (if any), advance its sequence id, and remove
    /// the item — the success path.
    Commit,
    /// Commit and advance the sequence id same as `Commit`, but the item is
    /// being discarded rather than having actually succeeded (spec §4.11:
    /// invalid-sequence-id, treated as a hash-key collision).
    CommitAndDiscard,
    /// Increment try count and re-dispatch immediately, bypassing the
    /// sender queue's own ordering.
    RetryNow,
    /// Return the item to `Idle`; the runner re-pops it on a later drain.
    RetryLater,
    /// Remove the item without committing anything.
    Discard,
}

/// Thresholds governing the retry table (spec §4.11).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicyConfig {
    /// Above this try count, an `Unauthorized` outcome is discarded instead
    /// of retried.
    pub unauth_max: u32,
    /// Above this try count, an `Unknown` outcome is discarded instead of
    /// retried.
    pub unknown_max: u32,
    /// Once an item has sat in its sender queue longer than this, any
    /// retry decision is overridden to `Discard` (spec: "e.g. 6h").
    pub discard_fail_interval: Duration,
    /// Whether this flusher's destination is time-sync aware (spec §4.11:
    /// "request-time-expired with time-sync enabled").
    pub time_sync_enabled: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            unauth_max: 3,
            unknown_max: 5,
            discard_fail_interval: Duration::from_secs(6 * 3600),
            time_sync_enabled: true,
        }
    }
}

/// Classifies a [`SendOutcome`] into a [`RetryOperation`] per the ordered
/// table in spec §4.11. Stateless beyond its configuration: it reads
/// `item`'s try count and enqueue time but never mutates them.
pub struct RetryPolicy {
    config: RetryPolicyConfig,
}

impl RetryPolicy {
    /// Creates a policy with the given thresholds.
    #[must_use]
    pub fn new(config: RetryPolicyConfig) -> Self {
        Self { config }
    }

    /// Classifies `outcome` for `item`. `creds_advanced` reports whether a
    /// credential refresh attempted for an `Unauthorized` outcome produced
    /// newer credentials than the ones used for the failed attempt.
    /// `config_name` and `alarms` are used only for the quota alarm (spec:
    /// "emit quota alarm"), which fires unconditionally, unlike the
    /// discard alarm's profile/telemetry exception handled by the caller.
    pub fn classify(
        &self,
        outcome: &SendOutcome,
        item: &SenderQueueItem,
        now: Instant,
        creds_advanced: bool,
        alarms: &AlarmEmitter,
        config_name: &str,
    ) -> RetryOperation {
        let try_cnt = item.try_count();

        let op = match outcome {
            SendOutcome::Success => RetryOperation::Commit,
            SendOutcome::NetworkOrServerError { buffer_or_not: true } => RetryOperation::RetryLater,
            SendOutcome::NetworkOrServerError { buffer_or_not: false } => RetryOperation::Discard,
            SendOutcome::QuotaExceeded => {
                alarms.emit(AlarmCategory::Quota, config_name, "quota exceeded", now);
                RetryOperation::RetryLater
            }
            SendOutcome::Unauthorized if try_cnt > self.config.unauth_max => RetryOperation::Discard,
            SendOutcome::Unauthorized => {
                if creds_advanced {
                    RetryOperation::RetryNow
                } else {
                    RetryOperation::RetryLater
                }
            }
            SendOutcome::InvalidSequenceId => RetryOperation::CommitAndDiscard,
            SendOutcome::RequestTimeExpired if self.config.time_sync_enabled => RetryOperation::RetryNow,
            SendOutcome::RequestTimeExpired => self.classify_unknown(try_cnt),
            SendOutcome::Unknown => self.classify_unknown(try_cnt),
        };

        // Final override (spec §4.11 last row): an item that has sat past
        // `discard_fail_interval` is discarded regardless of the decision
        // above, but only on a retry path — `Commit`/`CommitAndDiscard`/
        // `Discard` are already terminal.
        if matches!(op, RetryOperation::RetryNow | RetryOperation::RetryLater)
            && now.duration_since(item.enqueue_time) > self.config.discard_fail_interval
        {
            return RetryOperation::Discard;
        }
        op
    }

    fn classify_unknown(&self, try_cnt: u32) -> RetryOperation {
        if try_cnt == 1 {
            RetryOperation::RetryNow
        } else if try_cnt > self.config.unknown_max {
            RetryOperation::Discard
        } else {
            RetryOperation::RetryLater
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use conduit_queue_key::QueueKeyRegistry;

    fn fresh_item() -> SenderQueueItem {
        let registry = QueueKeyRegistry::new();
        let dest = registry.get_key("dest-a");
        SenderQueueItem::new(Bytes::from_static(b"payload"), 7, 1, dest)
    }

    #[test]
    fn scenario_500_with_buffer_is_retry_later_and_leaves_try_count_untouched() {
        let policy = RetryPolicy::new(RetryPolicyConfig::default());
        let alarms = AlarmEmitter::new(Duration::from_secs(60));
        let item = fresh_item();
        assert_eq!(item.try_count(), 1);

        let op = policy.classify(
            &SendOutcome::NetworkOrServerError { buffer_or_not: true },
            &item,
            Instant::now(),
            false,
            &alarms,
            "cfg-a",
        );
        assert_eq!(op, RetryOperation::RetryLater);
        assert_eq!(item.try_count(), 1, "classify must not mutate try_count");
    }

    #[test]
    fn network_error_without_buffering_is_discarded() {
        let policy = RetryPolicy::new(RetryPolicyConfig::default());
        let alarms = AlarmEmitter::new(Duration::from_secs(60));
        let item = fresh_item();
        let op = policy.classify(
            &SendOutcome::NetworkOrServerError { buffer_or_not: false },
            &item,
            Instant::now(),
            false,
            &alarms,
            "cfg-a",
        );
        assert_eq!(op, RetryOperation::Discard);
    }

    #[test]
    fn unauthorized_retries_now_only_when_credentials_advanced() {
        let policy = RetryPolicy::new(RetryPolicyConfig::default());
        let alarms = AlarmEmitter::new(Duration::from_secs(60));
        let item = fresh_item();
        let retried_later = policy.classify(&SendOutcome::Unauthorized, &item, Instant::now(), false, &alarms, "cfg-a");
        assert_eq!(retried_later, RetryOperation::RetryLater);
        let retried_now = policy.classify(&SendOutcome::Unauthorized, &item, Instant::now(), true, &alarms, "cfg-a");
        assert_eq!(retried_now, RetryOperation::RetryNow);
    }

    #[test]
    fn unauthorized_past_max_is_discarded_regardless_of_creds() {
        let policy = RetryPolicy::new(RetryPolicyConfig::default());
        let alarms = AlarmEmitter::new(Duration::from_secs(60));
        let item = fresh_item();
        for _ in 0..5 {
            item.record_attempt(Instant::now());
        }
        assert!(item.try_count() > RetryPolicyConfig::default().unauth_max);
        let op = policy.classify(&SendOutcome::Unauthorized, &item, Instant::now(), true, &alarms, "cfg-a");
        assert_eq!(op, RetryOperation::Discard);
    }

    #[test]
    fn invalid_sequence_id_commits_and_discards() {
        let policy = RetryPolicy::new(RetryPolicyConfig::default());
        let alarms = AlarmEmitter::new(Duration::from_secs(60));
        let item = fresh_item();
        let op = policy.classify(&SendOutcome::InvalidSequenceId, &item, Instant::now(), false, &alarms, "cfg-a");
        assert_eq!(op, RetryOperation::CommitAndDiscard);
    }

    #[test]
    fn unknown_first_try_retries_now_then_later_then_discards() {
        let policy = RetryPolicy::new(RetryPolicyConfig::default());
        let alarms = AlarmEmitter::new(Duration::from_secs(60));
        let item = fresh_item();

        assert_eq!(
            policy.classify(&SendOutcome::Unknown, &item, Instant::now(), false, &alarms, "cfg-a"),
            RetryOperation::RetryNow
        );

        item.record_attempt(Instant::now());
        assert_eq!(
            policy.classify(&SendOutcome::Unknown, &item, Instant::now(), false, &alarms, "cfg-a"),
            RetryOperation::RetryLater
        );

        for _ in 0..10 {
            item.record_attempt(Instant::now());
        }
        assert_eq!(
            policy.classify(&SendOutcome::Unknown, &item, Instant::now(), false, &alarms, "cfg-a"),
            RetryOperation::Discard
        );
    }

    #[test]
    fn stale_item_is_discarded_even_when_otherwise_retryable() {
        let mut config = RetryPolicyConfig::default();
        config.discard_fail_interval = Duration::from_millis(1);
        let policy = RetryPolicy::new(config);
        let alarms = AlarmEmitter::new(Duration::from_secs(60));
        let item = fresh_item();
        let far_future = item.enqueue_time + Duration::from_secs(10);
        let op = policy.classify(
            &SendOutcome::NetworkOrServerError { buffer_or_not: true },
            &item,
            far_future,
            false,
            &alarms,
            "cfg-a",
        );
        assert_eq!(op, RetryOperation::Discard);
    }

    #[test]
    fn stale_override_does_not_apply_to_already_terminal_operations() {
        let mut config = RetryPolicyConfig::default();
        config.discard_fail_interval = Duration::from_millis(1);
        let policy = RetryPolicy::new(config);
        let alarms = AlarmEmitter::new(Duration::from_secs(60));
        let item = fresh_item();
        let far_future = item.enqueue_time + Duration::from_secs(10);
        let op = policy.classify(&SendOutcome::Success, &item, far_future, false, &alarms, "cfg-a");
        assert_eq!(op, RetryOperation::Commit);
    }
}
