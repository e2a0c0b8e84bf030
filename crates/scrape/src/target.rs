// SPDX-License-Identifier: Apache-2.0

//! Per-target synthetic label construction and the URL they resolve to
//! (spec §4.13).

use std::collections::HashMap;

use conduit_config::ScrapeJobConfig;
use conduit_model::{
    Labels, LABEL_ADDRESS, LABEL_JOB, LABEL_METRICS_PATH, LABEL_PARAM_PREFIX, LABEL_SCHEME, LABEL_SCRAPE_INTERVAL,
    LABEL_SCRAPE_TIMEOUT,
};

/// Formats a seconds duration the way spec §4.13's `__scrape_interval__`/
/// `__scrape_timeout__` labels do: whole minutes as `"Nm"`, otherwise
/// seconds as `"Ns"`.
#[must_use]
pub fn format_duration_label(seconds: u64) -> String {
    if seconds > 0 && seconds % 60 == 0 {
        format!("{}m", seconds / 60)
    } else {
        format!("{seconds}s")
    }
}

/// Builds the synthetic label set for one discovered `host:port` target,
/// merged with the operator-provided group labels (group labels take
/// precedence per [`Labels::merge`]).
#[must_use]
pub fn build_labels(address: &str, job: &ScrapeJobConfig, group_labels: &HashMap<String, String>) -> Labels {
    let mut labels = Labels::new();
    labels.insert(LABEL_ADDRESS, address);
    labels.insert(LABEL_SCHEME, "http");
    labels.insert(LABEL_METRICS_PATH, "/metrics");
    labels.insert(LABEL_SCRAPE_INTERVAL, format_duration_label(job.scrape_interval_secs));
    labels.insert(LABEL_SCRAPE_TIMEOUT, format_duration_label(job.scrape_timeout_secs));
    labels.insert(LABEL_JOB, job.job_name.clone());

    let mut group = Labels::new();
    for (key, value) in group_labels {
        group.insert(key.clone(), value.clone());
    }
    labels.merge(&group);

    labels
}

/// Resolves the scrape URL from a target's synthetic labels (`__scheme__`,
/// `__address__`, `__metrics_path__`, `__param_*`), before the relabel
/// pipeline strips them.
#[must_use]
pub fn resolve_url(labels: &Labels) -> String {
    let scheme = labels.get(LABEL_SCHEME).unwrap_or("http");
    let address = labels.get(LABEL_ADDRESS).unwrap_or_default();
    let path = labels.get(LABEL_METRICS_PATH).unwrap_or("/metrics");

    let mut query_params: Vec<(String, String)> = labels
        .iter()
        .filter_map(|(k, v)| k.strip_prefix(LABEL_PARAM_PREFIX).map(|name| (name.to_string(), v.to_string())))
        .collect();
    query_params.sort();

    let mut url = format!("{scheme}://{address}{path}");
    if !query_params.is_empty() {
        url.push('?');
        let parts: Vec<String> = query_params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        url.push_str(&parts.join("&"));
    }
    url
}

/// Deterministic pseudo-random offset in `[0, interval)` derived from a
/// target identity hash, so targets of a job don't all scrape in lockstep
/// (spec §4.13).
#[must_use]
pub fn initial_offset(identity_hash: u64, interval: std::time::Duration) -> std::time::Duration {
    if interval.is_zero() {
        return std::time::Duration::ZERO;
    }
    let interval_ms = interval.as_millis().max(1) as u64;
    std::time::Duration::from_millis(identity_hash % interval_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn job() -> ScrapeJobConfig {
        ScrapeJobConfig {
            job_name: "web".to_string(),
            scrape_interval_secs: 15,
            scrape_timeout_secs: 10,
            relabel_configs: Vec::new(),
        }
    }

    #[test]
    fn formats_minutes_when_evenly_divisible() {
        assert_eq!(format_duration_label(120), "2m");
        assert_eq!(format_duration_label(15), "15s");
    }

    #[test]
    fn build_labels_merges_group_labels_over_synthetics() {
        let mut group = HashMap::new();
        group.insert(conduit_model::LABEL_JOB.to_string(), "override".to_string());
        let labels = build_labels("10.0.0.1:9100", &job(), &group);
        assert_eq!(labels.get(LABEL_JOB), Some("override"));
        assert_eq!(labels.get(LABEL_ADDRESS), Some("10.0.0.1:9100"));
        assert_eq!(labels.get(LABEL_SCRAPE_INTERVAL), Some("15s"));
    }

    #[test]
    fn resolve_url_includes_sorted_param_query_string() {
        let mut labels = Labels::new();
        labels.insert(LABEL_ADDRESS, "10.0.0.1:9100");
        labels.insert(LABEL_SCHEME, "http");
        labels.insert(LABEL_METRICS_PATH, "/metrics");
        labels.insert(format!("{LABEL_PARAM_PREFIX}target"), "b");
        labels.insert(format!("{LABEL_PARAM_PREFIX}module"), "a");
        let url = resolve_url(&labels);
        assert_eq!(url, "http://10.0.0.1:9100/metrics?module=a&target=b");
    }

    #[test]
    fn initial_offset_is_deterministic_for_same_hash() {
        let a = initial_offset(12345, Duration::from_secs(15));
        let b = initial_offset(12345, Duration::from_secs(15));
        assert_eq!(a, b);
        assert!(a < Duration::from_secs(15));
    }
}
