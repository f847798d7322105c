//! Ships events to a Loki push API endpoint (spec.md §6): one stream entry
//! per event, labelled from the configured static label set plus the
//! event's involved-object name/namespace.

use super::common::{parse_config, serialize_event};
use super::{Sink, SinkError};
use crate::event::Event;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Config {
    url: String,
    labels: BTreeMap<String, String>,
    de_dot: bool,
    layout: Option<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            labels: BTreeMap::new(),
            de_dot: false,
            layout: None,
        }
    }
}

pub struct LokiSink {
    config: Config,
    client: Client,
}

impl LokiSink {
    pub fn start(raw_config: &serde_yaml::Value) -> Result<Self, SinkError> {
        let config: Config = parse_config(raw_config)?;
        if config.url.is_empty() {
            return Err(SinkError::Start {
                sink_type: "loki".to_owned(),
                reason: "`url` is required".to_owned(),
            });
        }
        Ok(Self {
            config,
            client: Client::new(),
        })
    }

    fn stream_labels(&self, event: &Event) -> BTreeMap<String, String> {
        let mut labels = self.config.labels.clone();
        labels.insert("namespace".to_owned(), event.involved_object.namespace.clone());
        labels.insert("name".to_owned(), event.involved_object.name.clone());
        labels
    }
}

#[async_trait]
impl Sink for LokiSink {
    async fn send(&self, event: &Event) -> Result<(), SinkError> {
        let value = serialize_event(event, self.config.de_dot, self.config.layout.as_ref())
            .map_err(|source| SinkError::Serialize { source })?;
        let line = serde_json::to_string(&value).expect("Value is always encodable");

        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0);

        let payload = serde_json::json!({
            "streams": [{
                "stream": self.stream_labels(event),
                "values": [[nanos.to_string(), line]],
            }],
        });

        let response = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| SinkError::Transport {
                reason: err.to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::UnretryableStatus {
                status: response.status().as_u16(),
            })
        }
    }

    async fn close(&self) {}
}
