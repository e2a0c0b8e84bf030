// SPDX-License-Identifier: Apache-2.0

//! Local bookkeeping for a pipeline or instance config fetched from the
//! control plane, and its atomic on-disk persistence.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::Path;

/// Lifecycle status of a config as tracked locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigStatus {
    /// No status has been recorded yet.
    Unset,
    /// The config has been written to disk and is awaiting confirmation of
    /// successful application by the consumer.
    Applying,
    /// The consumer confirmed successful application.
    Applied,
    /// The consumer reported the config failed to apply.
    Failed,
    /// The config was deleted by the control plane.
    Deleted,
}

/// `{name, version, status, detail, message}` as described in spec §3.
#[derive(Debug, Clone)]
pub struct ConfigInfo {
    /// Config name, also the on-disk file stem.
    pub name: String,
    /// Monotonically increasing version assigned by the control plane.
    pub version: i64,
    /// Local lifecycle status.
    pub status: ConfigStatus,
    /// Free-form detail, usually the raw JSON body of the config.
    pub detail: String,
    /// Optional human-readable status message (e.g. apply error).
    pub message: Option<String>,
}

impl ConfigInfo {
    /// Writes `detail` (with an embedded `version` field) to
    /// `<dir>/<name>.json` using a temp-file-then-rename so a crash between
    /// the two steps never leaves a truncated file (spec §8 "config file
    /// atomicity").
    pub fn persist_atomically(&self, dir: &Path) -> io::Result<()> {
        let mut value: Value = serde_json::from_str(&self.detail).unwrap_or(Value::Object(Default::default()));
        if let Value::Object(map) = &mut value {
            let _ = map.insert("version".to_string(), Value::from(self.version));
        }
        let rendered = serde_json::to_vec_pretty(&value)?;

        fs::create_dir_all(dir)?;
        let final_path = dir.join(format!("{}.json", self.name));
        let tmp_path = dir.join(format!("{}.json.new", self.name));
        fs::write(&tmp_path, rendered)?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    /// Removes the persisted file for `name` under `dir`, if present.
    pub fn remove_persisted(dir: &Path, name: &str) -> io::Result<()> {
        let path = dir.join(format!("{name}.json"));
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Loads `<dir>/<name>.json` back, extracting the embedded `version`.
    pub fn load(dir: &Path, name: &str) -> io::Result<Self> {
        let path = dir.join(format!("{name}.json"));
        let raw = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&raw)?;
        let version = value.get("version").and_then(Value::as_i64).unwrap_or(0);
        Ok(Self {
            name: name.to_string(),
            version,
            status: ConfigStatus::Applying,
            detail: raw,
            message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn persist_then_load_round_trips_version() {
        let dir = tempdir().unwrap();
        let info = ConfigInfo {
            name: "P".to_string(),
            version: 7,
            status: ConfigStatus::Applying,
            detail: r#"{"a":1}"#.to_string(),
            message: None,
        };
        info.persist_atomically(dir.path()).unwrap();

        let loaded = ConfigInfo::load(dir.path(), "P").unwrap();
        assert_eq!(loaded.version, 7);
        let value: Value = serde_json::from_str(&loaded.detail).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["version"], 7);
    }

    #[test]
    fn no_temp_file_left_behind_after_persist() {
        let dir = tempdir().unwrap();
        let info = ConfigInfo {
            name: "Q".to_string(),
            version: 1,
            status: ConfigStatus::Applying,
            detail: "{}".to_string(),
            message: None,
        };
        info.persist_atomically(dir.path()).unwrap();
        assert!(!dir.path().join("Q.json.new").exists());
        assert!(dir.path().join("Q.json").exists());
    }
}
