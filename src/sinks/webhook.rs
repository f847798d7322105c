//! POSTs events to an HTTP(S) endpoint (spec.md §6): retries on 429 and
//! server errors with jittered exponential backoff, optional templated
//! headers, optional TLS material for talking to a private endpoint.

use super::common::{parse_config, serialize_event};
use super::{Sink, SinkError};
use crate::event::Event;
use crate::template;
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Certificate, Client, Identity, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Config {
    endpoint: String,
    headers: BTreeMap<String, String>,
    insecure_skip_verify: bool,
    ca_file: Option<String>,
    cert_file: Option<String>,
    key_file: Option<String>,
    de_dot: bool,
    layout: Option<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            headers: BTreeMap::new(),
            insecure_skip_verify: false,
            ca_file: None,
            cert_file: None,
            key_file: None,
            de_dot: false,
            layout: None,
        }
    }
}

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(100);

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

pub struct WebhookSink {
    config: Config,
    client: Client,
}

impl WebhookSink {
    pub fn start(raw_config: &serde_yaml::Value) -> Result<Self, SinkError> {
        let config: Config = parse_config(raw_config)?;
        if config.endpoint.is_empty() {
            return Err(SinkError::Start {
                sink_type: "webhook".to_owned(),
                reason: "`endpoint` is required".to_owned(),
            });
        }

        let mut builder = Client::builder().danger_accept_invalid_certs(config.insecure_skip_verify);

        if let Some(ca_file) = &config.ca_file {
            let pem = std::fs::read(ca_file).map_err(|err| SinkError::Start {
                sink_type: "webhook".to_owned(),
                reason: format!("reading caFile {ca_file}: {err}"),
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|err| SinkError::Start {
                sink_type: "webhook".to_owned(),
                reason: format!("parsing caFile {ca_file}: {err}"),
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if let (Some(cert_file), Some(key_file)) = (&config.cert_file, &config.key_file) {
            let mut pem = std::fs::read(cert_file).map_err(|err| SinkError::Start {
                sink_type: "webhook".to_owned(),
                reason: format!("reading certFile {cert_file}: {err}"),
            })?;
            let mut key_pem = std::fs::read(key_file).map_err(|err| SinkError::Start {
                sink_type: "webhook".to_owned(),
                reason: format!("reading keyFile {key_file}: {err}"),
            })?;
            pem.append(&mut key_pem);
            let identity = Identity::from_pem(&pem).map_err(|err| SinkError::Start {
                sink_type: "webhook".to_owned(),
                reason: format!("building client identity: {err}"),
            })?;
            builder = builder.identity(identity);
        }

        let client = builder.build().map_err(|err| SinkError::Start {
            sink_type: "webhook".to_owned(),
            reason: err.to_string(),
        })?;

        Ok(Self { config, client })
    }

    /// Renders each header value as a template against the event's context.
    /// A header whose template fails to render falls back to the raw
    /// template string as its value, not fatal — the event still ships.
    fn render_headers(&self, event: &Event) -> Vec<(String, String)> {
        let context = template::context_for(event);
        self.config
            .headers
            .iter()
            .map(|(name, raw_template)| match template::render(raw_template, &context) {
                Ok(value) => (name.clone(), value),
                Err(err) => {
                    debug!(message = "header template failed to render, using raw template", header = %name, %err);
                    (name.clone(), raw_template.clone())
                }
            })
            .collect()
    }
}

#[async_trait]
impl Sink for WebhookSink {
    async fn send(&self, event: &Event) -> Result<(), SinkError> {
        let value = serialize_event(event, self.config.de_dot, self.config.layout.as_ref())
            .map_err(|source| SinkError::Serialize { source })?;
        let headers = self.render_headers(event);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.client.post(&self.config.endpoint).json(&value);
            for (name, header_value) in &headers {
                request = request.header(name, header_value);
            }

            let outcome = request.send().await;
            match outcome {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) if is_retryable_status(response.status()) && attempt < MAX_ATTEMPTS => {
                    backoff(attempt).await;
                    continue;
                }
                Ok(response) => {
                    return Err(SinkError::UnretryableStatus {
                        status: response.status().as_u16(),
                    });
                }
                Err(err) if attempt < MAX_ATTEMPTS => {
                    debug!(message = "webhook request failed, retrying", attempt, %err);
                    backoff(attempt).await;
                    continue;
                }
                Err(err) => {
                    return Err(SinkError::Transport {
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    async fn close(&self) {}
}

async fn backoff(attempt: u32) {
    let exponent = attempt.saturating_sub(1);
    let base = BASE_BACKOFF.as_millis() as f64 * 2f64.powi(exponent as i32);
    let jitter = rand::thread_rng().gen_range(-0.2..=0.2);
    let delay_ms = (base * (1.0 + jitter)).max(0.0) as u64;
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses_match_spec_list() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn missing_endpoint_is_a_start_error() {
        let err = WebhookSink::start(&serde_yaml::Value::Null).unwrap_err();
        assert!(matches!(err, SinkError::Start { .. }));
    }
}
