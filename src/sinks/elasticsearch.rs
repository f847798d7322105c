//! Elasticsearch/OpenSearch sink (spec.md §6, §9 Open Question iii): the two
//! flavors share a wire format and differ only in a cosmetic default path
//! segment, so one adapter serves both behind a `Flavor` tag.

use super::common::{parse_config, serialize_event};
use super::{Sink, SinkError};
use crate::event::Event;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Elasticsearch,
    OpenSearch,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Auth {
    None,
    Basic,
    ApiKey,
}

impl Default for Auth {
    fn default() -> Self {
        Auth::None
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Config {
    hosts: Vec<String>,
    index_format: String,
    doc_type: Option<String>,
    use_event_id: bool,
    auth: Auth,
    username: String,
    password: String,
    api_key: String,
    de_dot: bool,
    layout: Option<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            index_format: "kubesee".to_owned(),
            doc_type: None,
            use_event_id: false,
            auth: Auth::None,
            username: String::new(),
            password: String::new(),
            api_key: String::new(),
            de_dot: true,
            layout: None,
        }
    }
}

pub struct ElasticsearchSink {
    config: Config,
    flavor: Flavor,
    client: Client,
}

impl ElasticsearchSink {
    pub fn start(raw_config: &serde_yaml::Value, flavor: Flavor) -> Result<Self, SinkError> {
        let config: Config = parse_config(raw_config)?;
        if config.hosts.is_empty() {
            return Err(SinkError::Start {
                sink_type: sink_type_name(flavor).to_owned(),
                reason: "`hosts` must contain at least one entry".to_owned(),
            });
        }
        Ok(Self {
            config,
            flavor,
            client: Client::new(),
        })
    }
}

fn sink_type_name(flavor: Flavor) -> &'static str {
    match flavor {
        Flavor::Elasticsearch => "elasticsearch",
        Flavor::OpenSearch => "opensearch",
    }
}

/// Reference-time placeholders ordered longest-match-first, the way Go's
/// `time.Format` tokenises its `2006-01-02T15:04:05` reference string.
const PLACEHOLDERS: &[(&str, &str)] = &[
    ("2006", "%Y"),
    ("06", "%y"),
    ("01", "%m"),
    ("02", "%d"),
    ("15", "%H"),
    ("04", "%M"),
    ("05", "%S"),
];

/// Expands a Go-style reference-time index format into a concrete index
/// name. Only text inside `{ … }` blocks is interpreted as reference-time
/// placeholders (spec.md §6, §8 scenario 3); everything outside the braces
/// passes through unchanged, and the braces themselves are dropped from the
/// output (`"kube-events-{2006-01-02}"` -> `"kube-events-2024-03-15"`).
fn expand_index_format(format: &str, timestamp: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let Some(end) = format[i + 1..].find('}') else {
            out.push(c);
            continue;
        };
        let block = &format[i + 1..i + 1 + end];
        out.push_str(&expand_placeholders(block, timestamp));
        // Skip past the consumed block and its closing brace.
        for _ in 0..=end {
            chars.next();
        }
    }
    out
}

/// Substitutes every reference-time placeholder in `block`, longest match
/// first, leaving non-placeholder characters untouched.
fn expand_placeholders(block: &str, timestamp: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(block.len());
    let bytes = block.as_bytes();
    let mut i = 0;
    'outer: while i < bytes.len() {
        let rest = &block[i..];
        for (placeholder, strftime) in PLACEHOLDERS {
            if rest.starts_with(placeholder) {
                out.push_str(&timestamp.format(strftime).to_string());
                i += placeholder.len();
                continue 'outer;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn document_path(config: &Config, _flavor: Flavor, index: &str, event: &Event) -> String {
    let mut path = format!("/{index}");
    if let Some(doc_type) = &config.doc_type {
        path.push('/');
        path.push_str(doc_type);
    }
    path.push_str("/_doc");
    if config.use_event_id {
        path.push('/');
        path.push_str(&event.uid);
    }
    path
}

#[async_trait]
impl Sink for ElasticsearchSink {
    async fn send(&self, event: &Event) -> Result<(), SinkError> {
        let value = serialize_event(event, self.config.de_dot, self.config.layout.as_ref())
            .map_err(|source| SinkError::Serialize { source })?;

        let timestamp = event.age_timestamp().unwrap_or_else(Utc::now);
        let index = expand_index_format(&self.config.index_format, timestamp);
        let path = document_path(&self.config, self.flavor, &index, event);
        let host = self.config.hosts.first().expect("start() validated hosts is non-empty");
        let url = format!("{}{}", host.trim_end_matches('/'), path);

        let mut request = if self.config.use_event_id {
            self.client.put(&url)
        } else {
            self.client.post(&url)
        };

        request = match self.config.auth {
            Auth::None => request,
            Auth::Basic => request.basic_auth(&self.config.username, Some(&self.config.password)),
            Auth::ApiKey => request.header("Authorization", format!("ApiKey {}", self.config.api_key)),
        };

        let response = request.json(&value).send().await.map_err(|err| SinkError::Transport {
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
