// SPDX-License-Identifier: Apache-2.0

//! Legacy YAML config import (spec §6: "Legacy YAML configs under
//! `legacy_yaml_dir` are watched by modification time and converted into
//! the active config directory on change"), ambient/optional — only runs
//! when `legacy_yaml_dir` is configured.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use conduit_model::ConfigInfo;

/// Tracks the last-seen modification time of every `*.yml`/`*.yaml` file
/// under a legacy config directory, copying changed files into the active
/// pipeline config directory as JSON.
pub struct LegacyYamlWatcher {
    legacy_dir: PathBuf,
    active_dir: PathBuf,
    seen: HashMap<PathBuf, SystemTime>,
}

impl LegacyYamlWatcher {
    #[must_use]
    pub fn new(legacy_dir: PathBuf, active_dir: PathBuf) -> Self {
        Self { legacy_dir, active_dir, seen: HashMap::new() }
    }

    /// Scans `legacy_dir` for YAML files modified since the last scan,
    /// converts each to JSON, and writes it into `active_dir` via the same
    /// atomic-rename path used for control-plane-delivered configs.
    ///
    /// Returns the names of configs that changed on this pass.
    pub fn scan_once(&mut self) -> std::io::Result<Vec<String>> {
        let mut changed = Vec::new();
        if !self.legacy_dir.exists() {
            return Ok(changed);
        }

        for entry in std::fs::read_dir(&self.legacy_dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yml") | Some("yaml"));
            if !is_yaml {
                continue;
            }

            let modified = entry.metadata()?.modified()?;
            if self.seen.get(&path) == Some(&modified) {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let name = stem.to_string();

            let yaml_text = std::fs::read_to_string(&path)?;
            let value: serde_yaml::Value = serde_yaml::from_str(&yaml_text)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            let json_text = serde_json::to_string(&value)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

            let info = ConfigInfo {
                name: name.clone(),
                version: system_time_as_version(modified),
                status: conduit_model::ConfigStatus::Applying,
                detail: json_text,
                message: None,
            };
            info.persist_atomically(&self.active_dir)?;

            self.seen.insert(path, modified);
            changed.push(name);
        }

        Ok(changed)
    }
}

fn system_time_as_version(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn converts_new_yaml_file_to_json_on_first_scan() {
        let legacy = tempfile::tempdir().unwrap();
        let active = tempfile::tempdir().unwrap();
        fs::write(legacy.path().join("job-a.yml"), "key: value\n").unwrap();

        let mut watcher = LegacyYamlWatcher::new(legacy.path().to_path_buf(), active.path().to_path_buf());
        let changed = watcher.scan_once().unwrap();

        assert_eq!(changed, vec!["job-a".to_string()]);
        assert!(active.path().join("job-a.json").exists());
    }

    #[test]
    fn unchanged_file_is_not_reported_twice() {
        let legacy = tempfile::tempdir().unwrap();
        let active = tempfile::tempdir().unwrap();
        fs::write(legacy.path().join("job-a.yml"), "key: value\n").unwrap();

        let mut watcher = LegacyYamlWatcher::new(legacy.path().to_path_buf(), active.path().to_path_buf());
        let first = watcher.scan_once().unwrap();
        let second = watcher.scan_once().unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn missing_legacy_dir_returns_empty_without_error() {
        let active = tempfile::tempdir().unwrap();
        let mut watcher =
            LegacyYamlWatcher::new(PathBuf::from("/nonexistent/legacy/dir"), active.path().to_path_buf());
        assert!(watcher.scan_once().unwrap().is_empty());
    }
}
