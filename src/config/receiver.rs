//! Receiver parsing: a receiver is a `name` plus exactly one sink-type key.

use super::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;

const SINK_KEYS: &[&str] = &[
    "stdout",
    "file",
    "webhook",
    "pipe",
    "syslog",
    "loki",
    "elasticsearch",
    "opensearch",
    "kafka",
    "inMemory",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverRaw {
    name: Option<String>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_yaml::Value>,
}

/// A fully validated receiver: a unique name, the sink-type tag, and the
/// free-form sink config map passed verbatim to that sink's constructor.
#[derive(Debug, Clone)]
pub struct Receiver {
    pub name: String,
    pub sink_type: String,
    pub sink_config: serde_yaml::Value,
}

pub fn parse(raw: ReceiverRaw) -> Result<Receiver, ConfigError> {
    let name = match raw.name {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ConfigError::MissingReceiverName),
    };

    for key in raw.rest.keys() {
        if !SINK_KEYS.contains(&key.as_str()) {
            return Err(ConfigError::UnknownSinkKey {
                receiver: name,
                key: key.clone(),
            });
        }
    }

    match raw.rest.len() {
        0 => Err(ConfigError::NoSinkKey { receiver: name }),
        1 => {
            let (sink_type, sink_config) = raw.rest.into_iter().next().expect("checked len == 1");
            Ok(Receiver {
                name,
                sink_type,
                sink_config,
            })
        }
        _ => Err(ConfigError::MultipleSinkKeys {
            receiver: name,
            keys: raw.rest.into_keys().collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(yaml: &str) -> ReceiverRaw {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn single_sink_key_parses() {
        let receiver = parse(raw("name: a\nstdout:\n  layout: {}\n")).unwrap();
        assert_eq!(receiver.name, "a");
        assert_eq!(receiver.sink_type, "stdout");
    }

    #[test]
    fn missing_name_is_an_error() {
        assert!(matches!(
            parse(raw("stdout: {}\n")),
            Err(ConfigError::MissingReceiverName)
        ));
    }

    #[test]
    fn no_sink_key_is_an_error() {
        assert!(matches!(
            parse(raw("name: a\n")),
            Err(ConfigError::NoSinkKey { .. })
        ));
    }

    #[test]
    fn multiple_sink_keys_is_an_error() {
        assert!(matches!(
            parse(raw("name: a\nstdout: {}\nfile: {}\n")),
            Err(ConfigError::MultipleSinkKeys { .. })
        ));
    }

    #[test]
    fn unknown_sink_key_is_an_error() {
        assert!(matches!(
            parse(raw("name: a\nbogus: {}\n")),
            Err(ConfigError::UnknownSinkKey { .. })
        ));
    }
}
