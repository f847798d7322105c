//! Line-delimited JSON to stdout.

use super::common::{parse_config, serialize_event};
use super::{Sink, SinkError};
use crate::event::Event;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::sync::Mutex;
use tracing::trace;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Config {
    de_dot: bool,
    layout: Option<Value>,
}

pub struct StdoutSink {
    config: Config,
    stdout: Mutex<std::io::Stdout>,
}

impl StdoutSink {
    pub fn start(raw_config: &serde_yaml::Value) -> Result<Self, SinkError> {
        Ok(Self {
            config: parse_config(raw_config)?,
            stdout: Mutex::new(std::io::stdout()),
        })
    }
}

#[async_trait]
impl Sink for StdoutSink {
    async fn send(&self, event: &Event) -> Result<(), SinkError> {
        let value = serialize_event(event, self.config.de_dot, self.config.layout.as_ref())
            .map_err(|source| SinkError::Serialize { source })?;
        let line = serde_json::to_string(&value).expect("Value is always encodable");
        trace!(message = "writing event to stdout", bytes = line.len());
        let mut stdout = self.stdout.lock().expect("stdout mutex poisoned");
        writeln!(stdout, "{line}").map_err(|err| SinkError::Transport {
            reason: err.to_string(),
        })
    }

    async fn close(&self) {}
}
