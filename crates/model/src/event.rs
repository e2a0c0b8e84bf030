// SPDX-License-Identifier: Apache-2.0

//! Event batches flowing through process queues.

use crate::checkpoint::RangeCheckpoint;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single observability event (log line, metric sample, trace span) as a
/// raw payload plus its own tags, prior to batching into a
/// [`PipelineEventGroup`].
#[derive(Debug, Clone)]
pub struct Event {
    /// Raw encoded event content.
    pub payload: Arc<[u8]>,
    /// Per-event tags, merged with (but not overriding) group-level tags.
    pub tags: BTreeMap<String, String>,
}

/// A batch of events sharing tags, a source buffer, an optional pack-id
/// prefix, and an optional exactly-once checkpoint.
///
/// Immutable once constructed: processors that need to transform events
/// build a new group rather than mutate one in place, matching the
/// single-owner move semantics required by spec §9 (no multi-owner
/// fallback for queue items).
#[derive(Debug, Clone)]
pub struct PipelineEventGroup {
    events: Arc<Vec<Event>>,
    tags: BTreeMap<String, String>,
    source_buffer: Arc<[u8]>,
    pack_id_prefix: Option<String>,
    checkpoint: Option<RangeCheckpoint>,
}

impl PipelineEventGroup {
    /// Builds a new immutable event group.
    #[must_use]
    pub fn new(
        events: Vec<Event>,
        tags: BTreeMap<String, String>,
        source_buffer: Arc<[u8]>,
    ) -> Self {
        Self {
            events: Arc::new(events),
            tags,
            source_buffer,
            pack_id_prefix: None,
            checkpoint: None,
        }
    }

    /// Attaches a pack-id prefix used to build stable per-group identifiers.
    #[must_use]
    pub fn with_pack_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.pack_id_prefix = Some(prefix.into());
        self
    }

    /// Attaches an exactly-once checkpoint, opting this group into
    /// range-checkpoint delivery semantics.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: RangeCheckpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Number of events in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` iff this group has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates over the group's events.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Group-level tags.
    #[must_use]
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Source buffer this group was read from, kept alive for the lifetime
    /// of the group so downstream serialization can borrow from it.
    #[must_use]
    pub fn source_buffer(&self) -> &[u8] {
        &self.source_buffer
    }

    /// Optional pack-id prefix.
    #[must_use]
    pub fn pack_id_prefix(&self) -> Option<&str> {
        self.pack_id_prefix.as_deref()
    }

    /// Attached exactly-once checkpoint, if this group opted in.
    #[must_use]
    pub fn checkpoint(&self) -> Option<&RangeCheckpoint> {
        self.checkpoint.as_ref()
    }
}

/// Index of a pipeline's input source (e.g. which file-tail instance
/// produced this group), used to route feedback for backpressure.
pub type InputIndex = usize;

/// A wrapper around one event group plus the input index that produced it
/// and a generation counter identifying the pipeline version that produced
/// it, so a hot-reloaded pipeline can rebind retrying items without
/// dangling references (spec §9).
#[derive(Debug, Clone)]
pub struct ProcessQueueItem {
    /// The batched events.
    pub group: PipelineEventGroup,
    /// Which input produced this group.
    pub input_index: InputIndex,
    /// Generation of the owning pipeline at enqueue time; bumped on reload.
    pub pipeline_generation: u64,
}

impl ProcessQueueItem {
    /// Wraps `group` produced by `input_index` under the given pipeline
    /// generation.
    #[must_use]
    pub fn new(group: PipelineEventGroup, input_index: InputIndex, pipeline_generation: u64) -> Self {
        Self {
            group,
            input_index,
            pipeline_generation,
        }
    }
}
