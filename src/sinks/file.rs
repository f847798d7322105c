//! JSON-lines to a file with size-based rotation (spec.md §6).

use super::common::{parse_config, serialize_event};
use super::{Sink, SinkError};
use crate::event::Event;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Config {
    path: PathBuf,
    maxsize: u64,
    maxbackups: u32,
    maxage: u32,
    de_dot: bool,
    layout: Option<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            maxsize: 0,
            maxbackups: 0,
            maxage: 0,
            de_dot: false,
            layout: None,
        }
    }
}

struct State {
    file: File,
    size: u64,
}

pub struct FileSink {
    config: Config,
    state: Mutex<State>,
}

impl FileSink {
    pub async fn start(raw_config: &serde_yaml::Value) -> Result<Self, SinkError> {
        let config: Config = parse_config(raw_config)?;
        if config.path.as_os_str().is_empty() {
            return Err(SinkError::Start {
                sink_type: "file".to_owned(),
                reason: "`path` is required".to_owned(),
            });
        }
        let file = open_append(&config.path)?;
        let size = file
            .metadata()
            .map_err(|err| SinkError::Start {
                sink_type: "file".to_owned(),
                reason: err.to_string(),
            })?
            .len();
        Ok(Self {
            config,
            state: Mutex::new(State { file, size }),
        })
    }
}

fn open_append(path: &Path) -> Result<File, SinkError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| SinkError::Start {
            sink_type: "file".to_owned(),
            reason: err.to_string(),
        })
}

const MAX_BACKUP_CAP: u32 = 999;

#[async_trait]
impl Sink for FileSink {
    async fn send(&self, event: &Event) -> Result<(), SinkError> {
        let value = serialize_event(event, self.config.de_dot, self.config.layout.as_ref())
            .map_err(|source| SinkError::Serialize { source })?;
        let mut line = serde_json::to_string(&value).expect("Value is always encodable");
        line.push('\n');

        let mut state = self.state.lock().expect("file sink mutex poisoned");
        let incoming = line.len() as u64;
        let maxsize_bytes = self.config.maxsize.saturating_mul(1024 * 1024);

        if maxsize_bytes > 0 && state.size + incoming > maxsize_bytes {
            rotate(&self.config)?;
            state.file = open_append(&self.config.path)?;
            state.size = 0;
        }

        state
            .file
            .write_all(line.as_bytes())
            .map_err(|err| SinkError::Transport {
                reason: err.to_string(),
            })?;
        state.size += incoming;
        Ok(())
    }

    async fn close(&self) {}
}

/// Renames `path.N` -> `path.(N+1)` descending, then `path` -> `path.1`,
/// trims backups beyond `maxbackups`, and deletes backups older than
/// `maxage` days.
fn rotate(config: &Config) -> Result<(), SinkError> {
    let path = &config.path;
    if !path.exists() {
        return Ok(());
    }

    let existing = existing_backup_indices(path);
    for index in existing.iter().rev() {
        let from = backup_path(path, *index);
        let to = backup_path(path, index + 1);
        if let Err(err) = fs::rename(&from, &to) {
            warn!(message = "failed to rotate file backup", from = %from.display(), to = %to.display(), %err);
        }
    }

    let first_backup = backup_path(path, 1);
    fs::rename(path, &first_backup).map_err(|err| SinkError::Transport {
        reason: format!("rotating {}: {err}", path.display()),
    })?;

    trim_backups_beyond_max(path, config.maxbackups);
    if config.maxage > 0 {
        delete_aged_backups(path, config.maxage);
    }

    Ok(())
}

fn backup_path(path: &Path, index: u32) -> PathBuf {
    let mut os_string = path.as_os_str().to_owned();
    os_string.push(format!(".{index}"));
    PathBuf::from(os_string)
}

fn existing_backup_indices(path: &Path) -> Vec<u32> {
    (1..=MAX_BACKUP_CAP)
        .filter(|index| backup_path(path, *index).exists())
        .collect()
}

fn trim_backups_beyond_max(path: &Path, maxbackups: u32) {
    if maxbackups == 0 {
        return;
    }
    let cap = maxbackups.min(MAX_BACKUP_CAP);
    for index in existing_backup_indices(path) {
        if index > cap {
            let backup = backup_path(path, index);
            debug!(message = "trimming file backup beyond maxbackups", backup = %backup.display());
            let _ = fs::remove_file(backup);
        }
    }
}

fn delete_aged_backups(path: &Path, maxage_days: u32) {
    let max_age = Duration::from_secs(u64::from(maxage_days) * 24 * 60 * 60);
    let now = SystemTime::now();
    for index in existing_backup_indices(path) {
        let backup = backup_path(path, index);
        let Ok(metadata) = fs::metadata(&backup) else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        if now.duration_since(modified).unwrap_or_default() > max_age {
            debug!(message = "deleting aged-out file backup", backup = %backup.display());
            let _ = fs::remove_file(backup);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_util::sample_event;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        let raw = serde_yaml::to_value(serde_json::json!({"path": path})).unwrap();
        let sink = FileSink::start(&raw).await.unwrap();
        sink.send(&sample_event()).await.unwrap();
        sink.send(&sample_event()).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn rotates_when_maxsize_exceeded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        // maxsize is in MB; force rotation by writing more than zero MB with
        // a one-byte-equivalent threshold via a 0-MB rounds-down edge case,
        // so instead directly exercise `rotate()`'s renaming behavior.
        std::fs::write(&path, b"existing\n").unwrap();
        let config = Config {
            path: path.clone(),
            maxsize: 0,
            maxbackups: 0,
            maxage: 0,
            de_dot: false,
            layout: None,
        };
        rotate(&config).unwrap();
        assert!(!path.exists());
        assert!(backup_path(&path, 1).exists());
    }

    #[test]
    fn trims_backups_beyond_maxbackups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        for i in 1..=3 {
            std::fs::write(backup_path(&path, i), b"x").unwrap();
        }
        trim_backups_beyond_max(&path, 2);
        assert!(backup_path(&path, 1).exists());
        assert!(backup_path(&path, 2).exists());
        assert!(!backup_path(&path, 3).exists());
    }
}
