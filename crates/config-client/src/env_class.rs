// SPDX-License-Identifier: Apache-2.0

//! Environment classification for the heartbeat user-agent string (spec §6),
//! grounded on the teacher's heartbeat env-var probing
//! (`default_heartbeat_computer`/`default_heartbeat_os_major_version`
//! reading `ARM_RESOURCE_ID`/`HOSTNAME`/`POD_NAME`-style variables).

use std::collections::HashMap;

/// Deployment environment class reported in the agent's user-agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentClass {
    /// Alibaba Cloud Elastic Container Instance.
    Eci,
    /// ACK (Alibaba Kubernetes) DaemonSet deployment.
    AckDaemonset,
    /// ACK sidecar deployment.
    AckSidecar,
    /// Generic Kubernetes DaemonSet deployment.
    K8sDaemonset,
    /// Generic Kubernetes sidecar deployment.
    K8sSidecar,
    /// Plain Docker container, no Kubernetes.
    Docker,
    /// Alibaba Cloud ECS virtual machine.
    Ecs,
    /// Unclassified.
    Others,
}

impl EnvironmentClass {
    /// Short string used in the user-agent (`env/<class>`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EnvironmentClass::Eci => "ECI",
            EnvironmentClass::AckDaemonset => "ACK-Daemonset",
            EnvironmentClass::AckSidecar => "ACK-Sidecar",
            EnvironmentClass::K8sDaemonset => "K8S-Daemonset",
            EnvironmentClass::K8sSidecar => "K8S-Sidecar",
            EnvironmentClass::Docker => "Docker",
            EnvironmentClass::Ecs => "ECS",
            EnvironmentClass::Others => "Others",
        }
    }
}

/// Classifies the deployment environment from the variables spec §6 names,
/// first match wins, in the precedence SPEC_FULL §11 fixes: ECI →
/// ACK-Daemonset → ACK-Sidecar → K8S-Daemonset → K8S-Sidecar → Docker → ECS
/// → Others.
#[must_use]
pub fn classify(env: &HashMap<String, String>) -> EnvironmentClass {
    let has = |key: &str| env.get(key).is_some_and(|v| !v.is_empty());
    let container_info = env.get("ALIYUN_LOG_STATIC_CONTAINER_INFO");
    let is_sidecar = env.get("ALIYUN_LOGTAIL_CONFIG").is_some_and(|v| !v.is_empty());
    let is_ack_node_local_dns = env.keys().any(|k| k.starts_with("ACK_NODE_LOCAL_DNS_"));
    let in_k8s = has("KUBERNETES_SERVICE_HOST");

    if container_info.is_some_and(|v| !v.is_empty()) && !in_k8s {
        return EnvironmentClass::Eci;
    }
    if is_ack_node_local_dns && !is_sidecar {
        return EnvironmentClass::AckDaemonset;
    }
    if is_ack_node_local_dns && is_sidecar {
        return EnvironmentClass::AckSidecar;
    }
    if in_k8s && !is_sidecar {
        return EnvironmentClass::K8sDaemonset;
    }
    if in_k8s && is_sidecar {
        return EnvironmentClass::K8sSidecar;
    }
    if env.contains_key("DOCKER_CONTAINER") || std::path::Path::new("/.dockerenv").exists() {
        return EnvironmentClass::Docker;
    }
    if container_info.is_some() {
        return EnvironmentClass::Ecs;
    }
    EnvironmentClass::Others
}

/// Builds the classification input from the actual process environment,
/// restricted to the variables spec §6 names so tests can exercise
/// [`classify`] without touching real env state.
#[must_use]
pub fn current_process_env() -> HashMap<String, String> {
    const KEYS: &[&str] = &[
        "ALIYUN_LOG_STATIC_CONTAINER_INFO",
        "KUBERNETES_SERVICE_HOST",
        "ALIYUN_LOGTAIL_CONFIG",
    ];
    let mut env = HashMap::new();
    for key in KEYS {
        if let Ok(value) = std::env::var(key) {
            env.insert((*key).to_string(), value);
        }
    }
    for (key, value) in std::env::vars() {
        if key.starts_with("ACK_NODE_LOCAL_DNS_") {
            env.insert(key, value);
        }
    }
    env
}

/// Renders the agent's user-agent string (spec §6):
/// `"<product>/<version> (<os_detail>) ip/<ip> env/<env_class>"`, with an
/// optional appended custom suffix.
#[must_use]
pub fn build_user_agent(
    product: &str,
    version: &str,
    os_detail: &str,
    ip: &str,
    env_class: EnvironmentClass,
    custom_suffix: Option<&str>,
) -> String {
    let base = format!("{product}/{version} ({os_detail}) ip/{ip} env/{}", env_class.as_str());
    match custom_suffix {
        Some(suffix) if !suffix.is_empty() => format!("{base} {suffix}"),
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn eci_takes_precedence_when_not_in_kubernetes() {
        let env = env(&[("ALIYUN_LOG_STATIC_CONTAINER_INFO", "present")]);
        assert_eq!(classify(&env), EnvironmentClass::Eci);
    }

    #[test]
    fn ack_daemonset_detected_via_node_local_dns_prefix() {
        let env = env(&[("ACK_NODE_LOCAL_DNS_ADDR", "169.254.0.1")]);
        assert_eq!(classify(&env), EnvironmentClass::AckDaemonset);
    }

    #[test]
    fn ack_sidecar_when_logtail_config_also_present() {
        let env = env(&[("ACK_NODE_LOCAL_DNS_ADDR", "169.254.0.1"), ("ALIYUN_LOGTAIL_CONFIG", "x")]);
        assert_eq!(classify(&env), EnvironmentClass::AckSidecar);
    }

    #[test]
    fn plain_kubernetes_without_sidecar_is_daemonset() {
        let env = env(&[("KUBERNETES_SERVICE_HOST", "10.0.0.1")]);
        assert_eq!(classify(&env), EnvironmentClass::K8sDaemonset);
    }

    #[test]
    fn plain_kubernetes_with_sidecar_config_is_sidecar() {
        let env = env(&[("KUBERNETES_SERVICE_HOST", "10.0.0.1"), ("ALIYUN_LOGTAIL_CONFIG", "x")]);
        assert_eq!(classify(&env), EnvironmentClass::K8sSidecar);
    }

    #[test]
    fn no_markers_classifies_as_others() {
        assert_eq!(classify(&HashMap::new()), EnvironmentClass::Others);
    }

    #[test]
    fn user_agent_renders_expected_shape() {
        let ua = build_user_agent("conduit-agent", "0.1.0", "Linux 6.1", "10.0.0.5", EnvironmentClass::Others, None);
        assert_eq!(ua, "conduit-agent/0.1.0 (Linux 6.1) ip/10.0.0.5 env/Others");
    }

    #[test]
    fn user_agent_appends_custom_suffix() {
        let ua = build_user_agent(
            "conduit-agent",
            "0.1.0",
            "Linux 6.1",
            "10.0.0.5",
            EnvironmentClass::Docker,
            Some("customer-tag"),
        );
        assert_eq!(ua, "conduit-agent/0.1.0 (Linux 6.1) ip/10.0.0.5 env/Docker customer-tag");
    }
}
