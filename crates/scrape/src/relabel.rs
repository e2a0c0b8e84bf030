// SPDX-License-Identifier: Apache-2.0

//! The relabel-config pipeline (spec §4.13: "apply the job's relabel-config
//! pipeline; if the result is empty or explicitly dropped, skip the
//! target"), the minimal Prometheus-compatible subset SPEC_FULL §11 scopes
//! in: `keep`/`drop`/`replace`/`labeldrop`.

use conduit_model::Labels;
use conduit_config::{RelabelAction, RelabelRuleConfig};
use regex::Regex;

/// Applies every rule in order, short-circuiting to "dropped" as soon as a
/// `keep`/`drop` rule excludes the target.
///
/// Returns `None` if the target was dropped, or the resulting label set
/// otherwise.
#[must_use]
pub fn apply(mut labels: Labels, rules: &[RelabelRuleConfig]) -> Option<Labels> {
    for rule in rules {
        match rule.action {
            RelabelAction::Keep => {
                if !matches(&labels, rule) {
                    return None;
                }
            }
            RelabelAction::Drop => {
                if matches(&labels, rule) {
                    return None;
                }
            }
            RelabelAction::Replace => {
                apply_replace(&mut labels, rule);
            }
            RelabelAction::Labeldrop => {
                apply_labeldrop(&mut labels, rule);
            }
        }
    }

    if labels.is_empty() { None } else { Some(labels) }
}

fn joined_source(labels: &Labels, rule: &RelabelRuleConfig) -> String {
    rule.source_labels
        .iter()
        .map(|name| labels.get(name).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(&rule.separator)
}

fn matches(labels: &Labels, rule: &RelabelRuleConfig) -> bool {
    let Some(pattern) = &rule.regex else {
        return false;
    };
    let Ok(regex) = Regex::new(pattern) else {
        return false;
    };
    regex.is_match(&joined_source(labels, rule))
}

fn apply_replace(labels: &mut Labels, rule: &RelabelRuleConfig) {
    let (Some(pattern), Some(target), Some(replacement)) = (&rule.regex, &rule.target_label, &rule.replacement)
    else {
        return;
    };
    let Ok(regex) = Regex::new(pattern) else {
        return;
    };
    let source = joined_source(labels, rule);
    let Some(captures) = regex.captures(&source) else {
        return;
    };

    let mut expanded = String::new();
    captures.expand(replacement, &mut expanded);
    labels.insert(target.clone(), expanded);
}

fn apply_labeldrop(labels: &mut Labels, rule: &RelabelRuleConfig) {
    let Some(pattern) = &rule.regex else {
        return;
    };
    let Ok(regex) = Regex::new(pattern) else {
        return;
    };
    let to_remove: Vec<String> =
        labels.iter().filter(|(name, _)| regex.is_match(name)).map(|(name, _)| name.to_string()).collect();
    for name in to_remove {
        let _ = labels.remove(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(action: RelabelAction) -> RelabelRuleConfig {
        RelabelRuleConfig {
            action,
            source_labels: Vec::new(),
            separator: ";".to_string(),
            regex: None,
            target_label: None,
            replacement: None,
        }
    }

    #[test]
    fn keep_drops_target_when_source_does_not_match() {
        let mut labels = Labels::new();
        labels.insert("job", "web");
        let rules = vec![RelabelRuleConfig {
            source_labels: vec!["job".to_string()],
            regex: Some("db".to_string()),
            ..rule(RelabelAction::Keep)
        }];
        assert!(apply(labels, &rules).is_none());
    }

    #[test]
    fn drop_removes_target_when_source_matches() {
        let mut labels = Labels::new();
        labels.insert("job", "web");
        let rules = vec![RelabelRuleConfig {
            source_labels: vec!["job".to_string()],
            regex: Some("web".to_string()),
            ..rule(RelabelAction::Drop)
        }];
        assert!(apply(labels, &rules).is_none());
    }

    #[test]
    fn replace_sets_target_label_from_capture_group() {
        let mut labels = Labels::new();
        labels.insert("__address__", "10.0.0.5:9100");
        let rules = vec![RelabelRuleConfig {
            source_labels: vec!["__address__".to_string()],
            regex: Some(r"([^:]+):.*".to_string()),
            target_label: Some("instance_ip".to_string()),
            replacement: Some("$1".to_string()),
            ..rule(RelabelAction::Replace)
        }];
        let result = apply(labels, &rules).expect("target survives");
        assert_eq!(result.get("instance_ip"), Some("10.0.0.5"));
    }

    #[test]
    fn labeldrop_removes_every_matching_label_name() {
        let mut labels = Labels::new();
        labels.insert("__address__", "x");
        labels.insert("__scheme__", "http");
        labels.insert("job", "web");
        let rules = vec![RelabelRuleConfig { regex: Some(r"^__.*$".to_string()), ..rule(RelabelAction::Labeldrop) }];
        let result = apply(labels, &rules).expect("target survives");
        assert_eq!(result.get("job"), Some("web"));
        assert_eq!(result.get("__address__"), None);
    }

    #[test]
    fn empty_result_after_rules_drops_target() {
        let labels = Labels::new();
        let result = apply(labels, &[]);
        assert!(result.is_none());
    }
}
