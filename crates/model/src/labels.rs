// SPDX-License-Identifier: Apache-2.0

//! Label sets for scrape targets, and the synthetic label names the scrape
//! scheduler attaches before relabeling.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Synthetic label carrying the target's `host:port`.
pub const LABEL_ADDRESS: &str = "__address__";
/// Synthetic label carrying `http` or `https`.
pub const LABEL_SCHEME: &str = "__scheme__";
/// Synthetic label carrying the scrape path.
pub const LABEL_METRICS_PATH: &str = "__metrics_path__";
/// Synthetic label carrying the formatted scrape interval (e.g. `"15s"`).
pub const LABEL_SCRAPE_INTERVAL: &str = "__scrape_interval__";
/// Synthetic label carrying the formatted scrape timeout.
pub const LABEL_SCRAPE_TIMEOUT: &str = "__scrape_timeout__";
/// Prefix for synthetic URL query parameters (`__param_<name>`).
pub const LABEL_PARAM_PREFIX: &str = "__param_";
/// Reserved label carrying the job name.
pub const LABEL_JOB: &str = "job";

/// An ordered set of string labels. Ordered by key so two logically
/// identical label sets hash and compare identically regardless of
/// construction order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    /// An empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key` with `value`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.0.insert(key.into(), value.into());
    }

    /// Looks up a label's value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Merges `other` into `self`, with `other` taking precedence on
    /// conflicting keys (matching "synthetic labels merged with the
    /// returned labels" in spec §4.13, where job-provided labels may
    /// override synthetics other than reserved ones upstream relabeling is
    /// expected to police).
    pub fn merge(&mut self, other: &Labels) {
        for (k, v) in &other.0 {
            let _ = self.0.insert(k.clone(), v.clone());
        }
    }

    /// Removes every label whose name starts with `__` (internal/synthetic
    /// labels), used after the relabel pipeline has consumed them.
    pub fn drop_internal(&mut self) {
        self.0.retain(|k, _| !k.starts_with("__"));
    }

    /// `true` iff there are no labels left (a dropped target).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates labels in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Removes a label, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// A stable identity hash for this label set, used to diff target sets
    /// between scrape rounds (spec §4.13 "hash the surviving label set").
    #[must_use]
    pub fn identity_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for (k, v) in &self.0 {
            k.hash(&mut hasher);
            v.hash(&mut hasher);
        }
        hasher.finish()
    }
}
