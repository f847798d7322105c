//! Line-delimited JSON to a file or named pipe (spec.md §6: "Pipe. Same
//! framing as stdout, written to `path` instead — the classic use case is a
//! FIFO read by a downstream collector.").

use super::common::{parse_config, serialize_event};
use super::{Sink, SinkError};
use crate::event::Event;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Config {
    path: PathBuf,
    de_dot: bool,
    layout: Option<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            de_dot: false,
            layout: None,
        }
    }
}

pub struct PipeSink {
    config: Config,
    handle: Mutex<tokio::fs::File>,
}

impl PipeSink {
    pub async fn start(raw_config: &serde_yaml::Value) -> Result<Self, SinkError> {
        let config: Config = parse_config(raw_config)?;
        if config.path.as_os_str().is_empty() {
            return Err(SinkError::Start {
                sink_type: "pipe".to_owned(),
                reason: "`path` is required".to_owned(),
            });
        }
        let handle = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&config.path)
            .await
            .map_err(|err| SinkError::Start {
                sink_type: "pipe".to_owned(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            config,
            handle: Mutex::new(handle),
        })
    }
}

#[async_trait]
impl Sink for PipeSink {
    async fn send(&self, event: &Event) -> Result<(), SinkError> {
        let value = serialize_event(event, self.config.de_dot, self.config.layout.as_ref())
            .map_err(|source| SinkError::Serialize { source })?;
        let mut line = serde_json::to_string(&value).expect("Value is always encodable");
        line.push('\n');

        let mut handle = self.handle.lock().await;
        handle
            .write_all(line.as_bytes())
            .await
            .map_err(|err| SinkError::Transport {
                reason: err.to_string(),
            })
    }

    async fn close(&self) {
        let mut handle = self.handle.lock().await;
        let _ = handle.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_util::sample_event;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_a_line_per_event() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.pipe");
        let raw = serde_yaml::to_value(serde_json::json!({"path": path})).unwrap();
        let sink = PipeSink::start(&raw).await.unwrap();
        sink.send(&sample_event()).await.unwrap();
        sink.close().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn missing_path_is_a_start_error() {
        let raw = serde_yaml::Value::Null;
        let err = PipeSink::start(&raw).await.unwrap_err();
        assert!(matches!(err, SinkError::Start { .. }));
    }
}
