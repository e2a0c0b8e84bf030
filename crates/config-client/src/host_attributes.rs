// SPDX-License-Identifier: Apache-2.0

//! Host/agent attributes attached to every heartbeat (spec §4.12 item 1:
//! `attributes{hostname, ip, version, os_detail}`), grounded on the
//! teacher's `default_heartbeat_*` env-var-first functions.

use std::net::{IpAddr, SocketAddr, UdpSocket};
use sysinfo::System;

/// Reads the reported agent version, preferring the `IMAGE` env var the
/// teacher's `default_heartbeat_version` checks, falling back to the crate
/// version baked in at compile time.
#[must_use]
pub fn version() -> String {
    std::env::var("IMAGE").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string())
}

/// Reads the reported hostname, preferring explicit overrides the source
/// checks (`ARM_RESOURCE_ID`, `HOSTNAME`, `POD_NAME`) before falling back to
/// `sysinfo`.
#[must_use]
pub fn hostname() -> String {
    std::env::var("ARM_RESOURCE_ID")
        .or_else(|_| std::env::var("HOSTNAME"))
        .or_else(|_| std::env::var("POD_NAME"))
        .unwrap_or_else(|_| System::host_name().unwrap_or_else(|| "unknown-host".to_string()))
}

/// Formats `"<os name> <major>.<minor>"`, parsing `sysinfo::System::os_version`
/// the way the teacher's `parse_os_version` does (Windows `"10 (22H2)"` and
/// semver `"22.04.3"` forms).
#[must_use]
pub fn os_detail() -> String {
    let name = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
    let (major, minor) = parse_os_version(System::os_version().unwrap_or_default());
    format!("{name} {major}.{minor}")
}

fn parse_os_version(version: String) -> (String, String) {
    if version.is_empty() {
        return ("0".to_string(), "0".to_string());
    }
    if let Some(paren_start) = version.find('(') {
        let major = version[..paren_start].trim().to_string();
        let minor = version[paren_start..].trim_matches(|c| c == '(' || c == ')').to_string();
        return (major, minor);
    }
    let parts: Vec<&str> = version.split('.').collect();
    match parts.as_slice() {
        [major] => (major.to_string(), "0".to_string()),
        [major, minor, ..] => (major.to_string(), minor.to_string()),
        [] => ("0".to_string(), "0".to_string()),
    }
}

/// Best-effort outbound IP address, found by opening a UDP "connection" to a
/// well-known address and reading back the local socket (no packets are
/// sent). Falls back to the loopback address on failure.
#[must_use]
pub fn outbound_ip() -> String {
    (|| -> std::io::Result<String> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        let local: SocketAddr = socket.local_addr()?;
        Ok(local.ip().to_string())
    })()
    .unwrap_or_else(|_| IpAddr::from([127, 0, 0, 1]).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_windows_style_os_version() {
        let (major, minor) = parse_os_version("10 (22H2)".to_string());
        assert_eq!(major, "10");
        assert_eq!(minor, "22H2");
    }

    #[test]
    fn parses_semver_style_os_version() {
        let (major, minor) = parse_os_version("22.04.3".to_string());
        assert_eq!(major, "22");
        assert_eq!(minor, "04");
    }

    #[test]
    fn empty_os_version_falls_back_to_zero() {
        let (major, minor) = parse_os_version(String::new());
        assert_eq!(major, "0");
        assert_eq!(minor, "0");
    }

    #[test]
    fn outbound_ip_never_panics_and_is_nonempty() {
        assert!(!outbound_ip().is_empty());
    }
}
