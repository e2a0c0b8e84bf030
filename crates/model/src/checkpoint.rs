// SPDX-License-Identifier: Apache-2.0

//! Range checkpoints binding a region of a file-sourced input to a reserved
//! exactly-once sender-queue slot.

use parking_lot::Mutex;
use std::sync::Arc;

/// Feedback key used to notify the owning file reader once a checkpoint
/// commits, expressed as a plain integer rather than a back-pointer so the
/// reader and the checkpoint never hold references to each other.
pub type FeedbackKey = u64;

#[derive(Debug, Clone, Default)]
struct CheckpointState {
    hash_key: Option<String>,
    sequence_id: i64,
    read_offset: u64,
    read_length: u64,
    committed: bool,
}

/// A range checkpoint: `{index, hash_key, sequence_id, read_offset,
/// read_length, committed}` plus the feedback key used to notify upstream.
///
/// Cloning a `RangeCheckpoint` clones the handle, not the state: all clones
/// observe the same underlying slot, matching the single-writer-at-a-time
/// handoff described in spec §5 (owning thread, then the flusher runner on
/// the commit path).
#[derive(Debug, Clone)]
pub struct RangeCheckpoint {
    index: usize,
    feedback_key: FeedbackKey,
    state: Arc<Mutex<CheckpointState>>,
}

impl RangeCheckpoint {
    /// Creates an empty (not yet bound) checkpoint for the given slot index.
    #[must_use]
    pub fn new(index: usize, feedback_key: FeedbackKey) -> Self {
        Self {
            index,
            feedback_key,
            state: Arc::new(Mutex::new(CheckpointState::default())),
        }
    }

    /// Slot index this checkpoint occupies in its owning exactly-once queue.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The feedback key used to wake the owning file reader on commit.
    #[must_use]
    pub fn feedback_key(&self) -> FeedbackKey {
        self.feedback_key
    }

    /// A checkpoint is "complete" iff it has been bound to a `hash_key`,
    /// i.e. it is a replay of a previously persisted checkpoint rather than
    /// a fresh one being assigned a slot for the first time.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.lock().hash_key.is_some()
    }

    /// Returns the bound hash key, if any.
    #[must_use]
    pub fn hash_key(&self) -> Option<String> {
        self.state.lock().hash_key.clone()
    }

    /// Binds `hash_key` and the read range to this checkpoint.
    pub fn bind(&self, hash_key: String, read_offset: u64, read_length: u64) {
        let mut state = self.state.lock();
        state.hash_key = Some(hash_key);
        state.read_offset = read_offset;
        state.read_length = read_length;
    }

    /// Updates the read range while leaving a slot's already-bound
    /// `hash_key` (and its sequence id) untouched, used when a fresh item
    /// claims a slot whose shard identity outlives any one occupant.
    pub fn set_range(&self, read_offset: u64, read_length: u64) {
        let mut state = self.state.lock();
        state.read_offset = read_offset;
        state.read_length = read_length;
    }

    /// Current monotonically increasing sequence id for this checkpoint's
    /// hash key.
    #[must_use]
    pub fn sequence_id(&self) -> i64 {
        self.state.lock().sequence_id
    }

    /// `(read_offset, read_length)` of the bound range.
    #[must_use]
    pub fn read_range(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.read_offset, state.read_length)
    }

    /// Resets transient state on (re)placement into a slot: clears the
    /// committed flag and persists. Called once a slot assignment is final.
    pub fn prepare(&self) {
        self.state.lock().committed = false;
    }

    /// Marks the checkpoint committed. Must be followed by
    /// [`RangeCheckpoint::increase_sequence_id`] on the successful-send path.
    pub fn commit(&self) {
        self.state.lock().committed = true;
    }

    /// `true` once [`RangeCheckpoint::commit`] has run for the current
    /// sequence id.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state.lock().committed
    }

    /// Advances the sequence id. Only valid after a successful commit;
    /// callers must invoke `commit()` first.
    pub fn increase_sequence_id(&self) {
        self.state.lock().sequence_id += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_checkpoint_is_not_complete() {
        let cp = RangeCheckpoint::new(0, 1);
        assert!(!cp.is_complete());
    }

    #[test]
    fn bind_makes_checkpoint_complete() {
        let cp = RangeCheckpoint::new(0, 1);
        cp.bind("shard-a".to_string(), 10, 20);
        assert!(cp.is_complete());
        assert_eq!(cp.read_range(), (10, 20));
    }

    #[test]
    fn sequence_id_only_advances_after_commit() {
        let cp = RangeCheckpoint::new(0, 1);
        cp.bind("shard-a".to_string(), 0, 1);
        assert_eq!(cp.sequence_id(), 0);
        cp.commit();
        cp.increase_sequence_id();
        assert_eq!(cp.sequence_id(), 1);
        assert!(cp.is_committed());
    }

    #[test]
    fn clone_shares_underlying_slot() {
        let cp = RangeCheckpoint::new(0, 1);
        let clone = cp.clone();
        clone.bind("shared".to_string(), 0, 0);
        assert!(cp.is_complete());
    }
}
