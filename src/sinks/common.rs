//! Shared serialisation policy used by every sink (spec.md §4.7): dedotting
//! and layout rendering are sink-agnostic, so they live here once.

use super::SinkError;
use crate::event::Event;
use crate::template::{self, TemplateError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use snafu::{ResultExt, Snafu};

/// Deserialises a receiver's free-form `sink_config` map into a sink's own
/// typed config struct. An absent/`null` config (e.g. `stdout: {}` or even
/// `stdout:` with nothing after it) is treated as all-defaults.
pub fn parse_config<T: DeserializeOwned + Default>(raw: &serde_yaml::Value) -> Result<T, SinkError> {
    if raw.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(raw.clone()).map_err(|source| SinkError::InvalidConfig { source })
}

#[derive(Debug, Snafu)]
pub enum SerializeError {
    #[snafu(display("failed to render layout: {source}"))]
    Template { source: TemplateError },
    #[snafu(display("failed to JSON-encode event: {source}"))]
    Encoding { source: serde_json::Error },
}

/// Replaces `.` with `_` in every key of `map`, recursively — Elasticsearch
/// classically rejects dotted keys.
pub fn dedot_map(map: &std::collections::BTreeMap<String, String>) -> std::collections::BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.replace('.', "_"), v.clone()))
        .collect()
}

/// Returns a JSON representation of `event`, with labels/annotations
/// dedotted if `de_dot` is set, serialised through `layout` if one is
/// given, or JSON-encoded verbatim otherwise.
pub fn serialize_event(event: &Event, de_dot: bool, layout: Option<&Value>) -> Result<Value, SerializeError> {
    let event = if de_dot { dedot_event(event) } else { event.clone() };

    match layout {
        Some(layout) => {
            let context = template::context_for(&event);
            template::render_layout(layout, &context).context(TemplateSnafu)
        }
        None => serde_json::to_value(&event).context(EncodingSnafu),
    }
}

fn dedot_event(event: &Event) -> Event {
    let mut event = event.clone();
    event.involved_object.labels = dedot_map(&event.involved_object.labels);
    event.involved_object.annotations = dedot_map(&event.involved_object.annotations);
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_util::sample_event;

    #[test]
    fn dedot_replaces_dots_in_keys() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("kubernetes.io/name".to_owned(), "v".to_owned());
        let dedotted = dedot_map(&map);
        assert_eq!(dedotted.get("kubernetes_io/name"), Some(&"v".to_owned()));
    }

    #[test]
    fn dedot_is_idempotent() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("a.b.c".to_owned(), "v".to_owned());
        let once = dedot_map(&map);
        let twice = dedot_map(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn serialize_without_layout_is_plain_json() {
        let event = sample_event();
        let value = serialize_event(&event, false, None).unwrap();
        assert_eq!(value["message"], serde_json::json!("Created container"));
    }

    #[test]
    fn serialize_with_layout_renders_templates() {
        let event = sample_event();
        let layout = serde_json::json!({"msg": "{{.Message}}"});
        let value = serialize_event(&event, false, Some(&layout)).unwrap();
        assert_eq!(value, serde_json::json!({"msg": "Created container"}));
    }

    #[test]
    fn serialize_dedots_labels_when_requested() {
        let mut event = sample_event();
        event.involved_object.labels.insert("a.b".to_owned(), "v".to_owned());
        let layout = serde_json::json!({"labels": "{{.Labels | toJson}}"});
        let value = serialize_event(&event, true, Some(&layout)).unwrap();
        assert!(value["labels"].as_str().unwrap().contains("a_b"));
    }
}
