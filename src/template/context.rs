//! Builds the template context map for an [`Event`].

use crate::event::Event;
use serde_json::{json, Map, Value};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

fn render_timestamp(ts: Option<chrono::DateTime<chrono::Utc>>) -> Value {
    match ts {
        Some(ts) => json!(ts.format(TIMESTAMP_FORMAT).to_string()),
        None => json!(""),
    }
}

/// Builds the PascalCase context map described in spec.md §4.3, including
/// the two derived timestamp helpers.
pub fn build(event: &Event) -> Value {
    let age = event.age_timestamp();
    let mut map = Map::new();
    map.insert("Name".into(), json!(event.name));
    map.insert("Namespace".into(), json!(event.namespace));
    map.insert("UID".into(), json!(event.uid));
    map.insert("ResourceVersion".into(), json!(event.resource_version));
    map.insert("CreationTimestamp".into(), render_timestamp(event.creation_timestamp));
    map.insert("Labels".into(), json!(event.labels()));
    map.insert("Annotations".into(), json!(event.annotations()));
    map.insert("Message".into(), json!(event.message));
    map.insert("Reason".into(), json!(event.reason));
    map.insert("Type".into(), json!(event.event_type));
    map.insert("Count".into(), json!(event.count));
    map.insert("Action".into(), json!(event.action));
    map.insert("ReportingController".into(), json!(event.reporting_controller));
    map.insert("ReportingInstance".into(), json!(event.reporting_instance));
    map.insert("FirstTimestamp".into(), render_timestamp(event.first_timestamp));
    map.insert("LastTimestamp".into(), render_timestamp(event.last_timestamp));
    map.insert("EventTime".into(), render_timestamp(event.event_time));
    map.insert("ClusterName".into(), json!(event.cluster_name));
    map.insert(
        "InvolvedObject".into(),
        json!({
            "Kind": event.involved_object.kind,
            "Namespace": event.involved_object.namespace,
            "Name": event.involved_object.name,
            "UID": event.involved_object.uid,
            "APIVersion": event.involved_object.api_version,
            "ResourceVersion": event.involved_object.resource_version,
            "FieldPath": event.involved_object.field_path,
            "Labels": event.involved_object.labels,
            "Annotations": event.involved_object.annotations,
            "Deleted": event.involved_object.deleted,
        }),
    );
    map.insert(
        "Source".into(),
        json!({
            "Component": event.source.component,
            "Host": event.source.host,
        }),
    );
    // Callable leaves: resolved eagerly at context-build time rather than
    // deferred, since nothing about an already-constructed Event changes
    // between context build and template render.
    map.insert(
        "GetTimestampMs".into(),
        json!(age.map(|ts| ts.timestamp_millis())),
    );
    map.insert("GetTimestampISO8601".into(), render_timestamp(age));

    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_util::sample_event;

    #[test]
    fn builds_pascal_case_context() {
        let ctx = build(&sample_event());
        assert_eq!(ctx["Message"], json!("Created container"));
        assert_eq!(ctx["InvolvedObject"]["Kind"], json!("Pod"));
    }

    #[test]
    fn timestamps_render_empty_when_absent() {
        let ctx = build(&sample_event());
        assert_eq!(ctx["LastTimestamp"], json!(""));
        assert_eq!(ctx["GetTimestampISO8601"], json!(""));
        assert_eq!(ctx["GetTimestampMs"], Value::Null);
    }
}
