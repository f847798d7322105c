//! Publishes events to a Kafka topic via `rdkafka` (spec.md §6): partition
//! key is the event's UID (hash-partitioned by the broker), with optional
//! compression, SASL, and TLS.

use super::common::{parse_config, serialize_event};
use super::{Sink, SinkError};
use crate::event::Event;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Codec {
    #[default]
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl Codec {
    fn as_rdkafka(&self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Gzip => "gzip",
            Codec::Snappy => "snappy",
            Codec::Lz4 => "lz4",
            Codec::Zstd => "zstd",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
enum SaslMechanism {
    #[default]
    None,
    Plain,
    #[serde(rename = "scram-sha256")]
    ScramSha256,
    #[serde(rename = "scram-sha512")]
    ScramSha512,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Config {
    brokers: Vec<String>,
    topic: String,
    codec: Codec,
    tls: bool,
    sasl_mechanism: SaslMechanism,
    username: String,
    password: String,
    de_dot: bool,
    layout: Option<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            topic: String::new(),
            codec: Codec::default(),
            tls: false,
            sasl_mechanism: SaslMechanism::default(),
            username: String::new(),
            password: String::new(),
            de_dot: false,
            layout: None,
        }
    }
}

pub struct KafkaSink {
    config: Config,
    producer: FutureProducer,
}

impl KafkaSink {
    pub fn start(raw_config: &serde_yaml::Value) -> Result<Self, SinkError> {
        let config: Config = parse_config(raw_config)?;
        if config.brokers.is_empty() || config.topic.is_empty() {
            return Err(SinkError::Start {
                sink_type: "kafka".to_owned(),
                reason: "`brokers` and `topic` are both required".to_owned(),
            });
        }

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", config.brokers.join(","))
            .set("compression.codec", config.codec.as_rdkafka())
            .set("message.timeout.ms", "5000");

        let security_protocol = match (config.tls, config.sasl_mechanism != SaslMechanism::None) {
            (true, true) => "sasl_ssl",
            (true, false) => "ssl",
            (false, true) => "sasl_plaintext",
            (false, false) => "plaintext",
        };
        client_config.set("security.protocol", security_protocol);

        match config.sasl_mechanism {
            SaslMechanism::None => {}
            SaslMechanism::Plain => {
                client_config.set("sasl.mechanism", "PLAIN");
            }
            SaslMechanism::ScramSha256 => {
                client_config.set("sasl.mechanism", "SCRAM-SHA-256");
            }
            SaslMechanism::ScramSha512 => {
                client_config.set("sasl.mechanism", "SCRAM-SHA-512");
            }
        }
        if config.sasl_mechanism != SaslMechanism::None {
            client_config
                .set("sasl.username", &config.username)
                .set("sasl.password", &config.password);
        }

        let producer: FutureProducer = client_config.create().map_err(|err| SinkError::Start {
            sink_type: "kafka".to_owned(),
            reason: err.to_string(),
        })?;

        Ok(Self { config, producer })
    }
}

#[async_trait]
impl Sink for KafkaSink {
    async fn send(&self, event: &Event) -> Result<(), SinkError> {
        let value = serialize_event(event, self.config.de_dot, self.config.layout.as_ref())
            .map_err(|source| SinkError::Serialize { source })?;
        let payload = serde_json::to_string(&value).expect("Value is always encodable");
        let key = event.uid.clone();

        let record = FutureRecord::to(&self.config.topic).payload(&payload).key(&key);

        self.producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
            .map(|_| ())
            .map_err(|(err, _)| SinkError::Transport {
                reason: err.to_string(),
            })
    }

    async fn close(&self) {
        self.producer.flush(Duration::from_secs(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_brokers_or_topic_is_a_start_error() {
        let err = KafkaSink::start(&serde_yaml::Value::Null).unwrap_err();
        assert!(matches!(err, SinkError::Start { .. }));
    }

    #[test]
    fn security_protocol_reflects_tls_and_sasl_combination() {
        assert_eq!(
            match (true, true) {
                (true, true) => "sasl_ssl",
                (true, false) => "ssl",
                (false, true) => "sasl_plaintext",
                (false, false) => "plaintext",
            },
            "sasl_ssl"
        );
    }
}
