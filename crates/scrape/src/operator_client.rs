// SPDX-License-Identifier: Apache-2.0

//! Operator discovery HTTP API (spec §4.13, §6): register/unregister this
//! collector, and list targets for one job.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

/// One discovered group of targets sharing a label set, as returned by the
/// operator's `/jobs/<job>/targets` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Thin client over the operator's discovery endpoints.
pub struct OperatorClient {
    client: Client,
    base_url: String,
}

impl OperatorClient {
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self { client: Client::new(), base_url: format!("http://{host}:{port}") }
    }

    /// Registers this collector, retrying until the operator returns 200
    /// (spec §4.13: "on scheduler start, GET /register_collector... until
    /// 200"). Returns the millisecond epoch after which this collector is
    /// considered unregistered.
    pub async fn register_collector(&self, pod_name: &str) -> u64 {
        loop {
            let url = format!("{}/register_collector?pod_name={pod_name}", self.base_url);
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    if let Ok(body) = response.text().await {
                        if let Ok(deadline) = body.trim().parse() {
                            return deadline;
                        }
                    }
                }
                _ => {}
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// Unregisters this collector, up to 3 attempts (spec §4.13: "On stop,
    /// GET /unregister_collector... up to 3 times").
    pub async fn unregister_collector(&self, pod_name: &str) {
        let url = format!("{}/unregister_collector?pod_name={pod_name}", self.base_url);
        for attempt in 0..3 {
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => return,
                _ if attempt < 2 => tokio::time::sleep(Duration::from_millis(200)).await,
                _ => {}
            }
        }
    }

    /// Lists the current target set for one job.
    pub async fn targets(&self, job: &str, pod_name: &str, user_agent: &str) -> reqwest::Result<Vec<TargetGroup>> {
        let encoded_job = urlencode(job);
        let url = format!("{}/jobs/{encoded_job}/targets?collector_id={pod_name}", self.base_url);
        self.client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Prometheus-Refresh-Interval-Seconds", "5")
            .header("User-Agent", user_agent)
            .send()
            .await?
            .json()
            .await
    }
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("my job/1"), "my%20job%2F1");
        assert_eq!(urlencode("plain-job_1.0~x"), "plain-job_1.0~x");
    }
}
