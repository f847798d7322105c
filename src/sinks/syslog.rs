//! Ships events as RFC3164-ish syslog lines over TCP or UDP (spec.md §6):
//! `<134>{tag}: {json}\n`, where 134 is `local0.info` (facility 16 * 8 +
//! severity 6).

use super::common::{parse_config, serialize_event};
use super::{Sink, SinkError};
use crate::event::Event;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex;

const PRIORITY: u8 = 16 * 8 + 6;

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Protocol {
    #[default]
    Udp,
    Tcp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Config {
    protocol: Protocol,
    address: String,
    tag: String,
    de_dot: bool,
    layout: Option<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            address: String::new(),
            tag: "kubesee".to_owned(),
            de_dot: false,
            layout: None,
        }
    }
}

enum Transport {
    Tcp(TcpStream),
    Udp { socket: UdpSocket },
}

pub struct SyslogSink {
    config: Config,
    transport: Mutex<Transport>,
}

impl SyslogSink {
    pub async fn start(raw_config: &serde_yaml::Value) -> Result<Self, SinkError> {
        let config: Config = parse_config(raw_config)?;
        if config.address.is_empty() {
            return Err(SinkError::Start {
                sink_type: "syslog".to_owned(),
                reason: "`address` is required".to_owned(),
            });
        }

        let transport = match config.protocol {
            Protocol::Tcp => {
                let stream = TcpStream::connect(&config.address).await.map_err(|err| SinkError::Start {
                    sink_type: "syslog".to_owned(),
                    reason: err.to_string(),
                })?;
                Transport::Tcp(stream)
            }
            Protocol::Udp => {
                let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(|err| SinkError::Start {
                    sink_type: "syslog".to_owned(),
                    reason: err.to_string(),
                })?;
                socket.connect(&config.address).await.map_err(|err| SinkError::Start {
                    sink_type: "syslog".to_owned(),
                    reason: err.to_string(),
                })?;
                Transport::Udp { socket }
            }
        };

        Ok(Self {
            config,
            transport: Mutex::new(transport),
        })
    }
}

#[async_trait]
impl Sink for SyslogSink {
    async fn send(&self, event: &Event) -> Result<(), SinkError> {
        let value = serialize_event(event, self.config.de_dot, self.config.layout.as_ref())
            .map_err(|source| SinkError::Serialize { source })?;
        let body = serde_json::to_string(&value).expect("Value is always encodable");
        let line = format!("<{PRIORITY}>{}: {body}\n", self.config.tag);

        let mut transport = self.transport.lock().await;
        match &mut *transport {
            Transport::Tcp(stream) => stream
                .write_all(line.as_bytes())
                .await
                .map_err(|err| SinkError::Transport {
                    reason: err.to_string(),
                }),
            Transport::Udp { socket } => socket
                .send(line.as_bytes())
                .await
                .map(|_| ())
                .map_err(|err| SinkError::Transport {
                    reason: err.to_string(),
                }),
        }
    }

    async fn close(&self) {
        if let Transport::Tcp(stream) = &mut *self.transport.lock().await {
            let _ = stream.shutdown().await;
        }
    }
}
