// SPDX-License-Identifier: Apache-2.0

//! Scrape-scheduler settings (spec §4.13): operator discovery endpoint,
//! per-job intervals, and the relabel-config pipeline (SPEC_FULL §11: the
//! minimal Prometheus-compatible subset spec.md leaves undefined —
//! `keep`/`drop`/`replace`/`labeldrop`).

use crate::ConfigError;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// One relabel action, matched on a regex against the joined
/// `source_labels` values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelabelAction {
    /// Drop the target unless the joined source matches `regex`.
    Keep,
    /// Drop the target if the joined source matches `regex`.
    Drop,
    /// Set `target_label` to `replacement` (with regex capture groups) when
    /// the joined source matches `regex`.
    Replace,
    /// Remove any label whose name matches `regex`.
    Labeldrop,
}

/// One relabel rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelabelRuleConfig {
    /// The action to take.
    pub action: RelabelAction,
    /// Label names joined (with `separator`) to form the match subject.
    #[serde(default)]
    pub source_labels: Vec<String>,
    /// Joiner between `source_labels` values (default `;`).
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Regex the joined source is matched against.
    #[serde(default)]
    pub regex: Option<String>,
    /// Destination label for `replace`.
    #[serde(default)]
    pub target_label: Option<String>,
    /// Replacement template for `replace` (supports `$1`-style captures).
    #[serde(default)]
    pub replacement: Option<String>,
}

fn default_separator() -> String {
    ";".to_string()
}

/// One scrape job (spec §4.13 "ScrapeJob").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJobConfig {
    /// Job name, used in the operator discovery URL and the `job` label.
    pub job_name: String,
    /// Seconds between scrapes of each target in this job.
    pub scrape_interval_secs: u64,
    /// Per-scrape HTTP timeout in seconds.
    pub scrape_timeout_secs: u64,
    /// Relabel pipeline applied to each discovered target's label set.
    #[serde(default)]
    pub relabel_configs: Vec<RelabelRuleConfig>,
}

/// Top-level scrape scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSchedulerConfig {
    /// Operator discovery host.
    pub operator_host: String,
    /// Operator discovery port.
    pub operator_port: u16,
    /// This collector's pod name, used in discovery query params.
    pub pod_name: String,
    /// Jobs this scheduler runs.
    pub jobs: Vec<ScrapeJobConfig>,
    /// Address-family/CIDR preference used when a target resolves to
    /// multiple IPs (spec §9 open question: "should be a configurable
    /// allow-list"). Empty means no preference — first discovered address
    /// wins.
    #[serde(default)]
    pub preferred_cidrs: Vec<IpNet>,
}

impl ScrapeJobConfig {
    pub(crate) fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if self.scrape_interval_secs == 0 {
            errors.push(ConfigError::InvalidField {
                field: format!("{field}.scrape_interval_secs"),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scrape_timeout_secs == 0 || self.scrape_timeout_secs > self.scrape_interval_secs {
            errors.push(ConfigError::InvalidField {
                field: format!("{field}.scrape_timeout_secs"),
                reason: "must be nonzero and not exceed scrape_interval_secs".to_string(),
            });
        }
        for rule in &self.relabel_configs {
            if rule.action == RelabelAction::Replace && rule.target_label.is_none() {
                errors.push(ConfigError::InvalidField {
                    field: format!("{field}.relabel_configs"),
                    reason: "replace action requires target_label".to_string(),
                });
            }
        }
    }
}

impl ScrapeSchedulerConfig {
    pub(crate) fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if self.pod_name.is_empty() {
            errors.push(ConfigError::InvalidField {
                field: format!("{field}.pod_name"),
                reason: "must not be empty".to_string(),
            });
        }
        for job in &self.jobs {
            job.validate(&format!("{field}.jobs[{}]", job.job_name), errors);
        }
    }
}
