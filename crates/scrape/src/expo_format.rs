// SPDX-License-Identifier: Apache-2.0

//! Prometheus text exposition format parsing (spec §4.13: "parse text
//! exposition format, producing one MetricEvent per sample with the
//! target's labels").

/// One parsed sample line: `metric_name{labels} value [timestamp]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric_name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
    pub timestamp_ms: Option<i64>,
}

/// Parses the body of a `/metrics` response into samples, skipping comment
/// (`#`) and blank lines. Malformed lines are skipped rather than aborting
/// the whole parse, since one bad exporter line shouldn't drop a target's
/// otherwise-valid samples.
#[must_use]
pub fn parse(body: &str) -> Vec<Sample> {
    let mut samples = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(sample) = parse_line(line) {
            samples.push(sample);
        }
    }
    samples
}

fn parse_line(line: &str) -> Option<Sample> {
    let (name_and_labels, rest) = if let Some(brace_start) = line.find('{') {
        let brace_end = line[brace_start..].find('}')? + brace_start;
        let metric_name = line[..brace_start].trim().to_string();
        let labels = parse_labels(&line[brace_start + 1..brace_end]);
        (metric_name, (labels, line[brace_end + 1..].trim()))
    } else {
        let mut parts = line.splitn(2, char::is_whitespace);
        let metric_name = parts.next()?.to_string();
        let rest = parts.next().unwrap_or("").trim();
        (metric_name, (Vec::new(), rest))
    };

    let (labels, value_and_ts) = rest;
    let mut fields = value_and_ts.split_whitespace();
    let value: f64 = fields.next()?.parse().ok()?;
    let timestamp_ms = fields.next().and_then(|t| t.parse().ok());

    Some(Sample { metric_name: name_and_labels, labels, value, timestamp_ms })
}

/// Parses a comma-separated `name="value",...` label list, the way it
/// appears inside the braces of an exposition-format sample line.
fn parse_labels(body: &str) -> Vec<(String, String)> {
    let mut labels = Vec::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && (chars[i] == ',' || chars[i].is_whitespace()) {
            i += 1;
        }
        let name_start = i;
        while i < chars.len() && chars[i] != '=' {
            i += 1;
        }
        let name: String = chars[name_start..i].iter().collect::<String>().trim().to_string();
        if i >= chars.len() || name.is_empty() {
            break;
        }
        i += 1; // skip '='
        if i >= chars.len() || chars[i] != '"' {
            break;
        }
        i += 1; // skip opening quote

        let mut value = String::new();
        let mut escaped = false;
        while i < chars.len() {
            let ch = chars[i];
            if escaped {
                match ch {
                    'n' => value.push('\n'),
                    other => value.push(other),
                }
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                i += 1;
                break;
            } else {
                value.push(ch);
            }
            i += 1;
        }

        labels.push((name, value));
    }

    labels
}
