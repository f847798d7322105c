//! In-memory representation of a Kubernetes `Event` and its involved object.

mod involved_object;
mod source;

pub use involved_object::InvolvedObjectReference;
pub use source::Source;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A Kubernetes Event, lifted into kubesee's in-memory representation.
///
/// Constructed once by the watcher from a watch-stream message and never
/// mutated afterwards; the engine produces a new copy to stamp
/// [`Event::cluster_name`], it never edits one in place.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Event {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub resource_version: String,

    pub creation_timestamp: Option<DateTime<Utc>>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub event_time: Option<DateTime<Utc>>,

    pub reason: String,
    pub event_type: String,
    pub action: String,
    pub count: Option<i64>,
    pub reporting_controller: String,
    pub reporting_instance: String,

    pub message: String,

    /// Stamped by the engine from config, never read off the API object.
    pub cluster_name: String,

    pub involved_object: InvolvedObjectReference,
    pub source: Source,
}

impl Event {
    /// Returns the timestamp used for age filtering: `last_timestamp` if
    /// present, falling back to `event_time`.
    pub fn age_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp.or(self.event_time)
    }

    /// `count`, defaulting to 1 when the field was absent on the wire —
    /// matches Kubernetes' own convention that an event with no explicit
    /// count has occurred once.
    pub fn count_or_default(&self) -> i64 {
        self.count.unwrap_or(1)
    }

    /// Returns a copy of this event with `cluster_name` set. The engine
    /// calls this once per event, immediately after construction by the
    /// watcher and before routing.
    #[must_use]
    pub fn with_cluster_name(mut self, cluster_name: &str) -> Self {
        self.cluster_name = cluster_name.to_owned();
        self
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.involved_object.labels
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.involved_object.annotations
    }
}

#[cfg(test)]
pub mod test_util {
    use super::*;

    /// Builds a minimal but valid [`Event`] for use in unit tests across the
    /// crate; individual fields are overridden via the builder-style setters.
    pub fn sample_event() -> Event {
        Event {
            name: "my-pod.17abcdef".to_owned(),
            namespace: "default".to_owned(),
            uid: "11111111-1111-1111-1111-111111111111".to_owned(),
            resource_version: "1".to_owned(),
            creation_timestamp: None,
            first_timestamp: None,
            last_timestamp: None,
            event_time: None,
            reason: "Created".to_owned(),
            event_type: "Normal".to_owned(),
            action: String::new(),
            count: None,
            reporting_controller: String::new(),
            reporting_instance: String::new(),
            message: "Created container".to_owned(),
            cluster_name: String::new(),
            involved_object: InvolvedObjectReference {
                kind: "Pod".to_owned(),
                namespace: "default".to_owned(),
                name: "my-pod".to_owned(),
                uid: "22222222-2222-2222-2222-222222222222".to_owned(),
                api_version: "v1".to_owned(),
                resource_version: "1".to_owned(),
                field_path: String::new(),
                labels: BTreeMap::new(),
                annotations: BTreeMap::new(),
                owner_references: Vec::new(),
                deleted: false,
            },
            source: Source {
                component: "kubelet".to_owned(),
                host: "node-1".to_owned(),
            },
        }
    }
}
