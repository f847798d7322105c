//! Consumes the Kubernetes event watch stream (spec.md §4.5): filters to
//! `ADDED` messages, drops events past `max_event_age_seconds`, enriches
//! the involved-object reference, and hands the result to a callback.

pub mod mock;
pub mod source;

use crate::event::{Event, InvolvedObjectReference, Source};
use chrono::{DateTime, Utc};
use serde_json::Value;
use source::{EventSource, SourceError, WatchKind, WatchMessage};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, trace, warn};

fn str_at(value: &Value, path: &[&str]) -> String {
    let mut cursor = value;
    for segment in path {
        match cursor.get(segment) {
            Some(next) => cursor = next,
            None => return String::new(),
        }
    }
    cursor.as_str().map(str::to_owned).unwrap_or_default()
}

fn timestamp_at(value: &Value, path: &[&str]) -> Option<DateTime<Utc>> {
    let mut cursor = value;
    for segment in path {
        cursor = cursor.get(segment)?;
    }
    let text = cursor.as_str()?;
    DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.with_timezone(&Utc))
}

fn i64_at(value: &Value, path: &[&str]) -> Option<i64> {
    let mut cursor = value;
    for segment in path {
        cursor = cursor.get(segment)?;
    }
    cursor.as_i64()
}

/// Builds an [`Event`] from the raw Kubernetes `Event` resource JSON
/// delivered on the watch stream.
pub fn event_from_k8s_json(object: &Value) -> Event {
    Event {
        name: str_at(object, &["metadata", "name"]),
        namespace: str_at(object, &["metadata", "namespace"]),
        uid: str_at(object, &["metadata", "uid"]),
        resource_version: str_at(object, &["metadata", "resourceVersion"]),
        creation_timestamp: timestamp_at(object, &["metadata", "creationTimestamp"]),
        first_timestamp: timestamp_at(object, &["firstTimestamp"]),
        last_timestamp: timestamp_at(object, &["lastTimestamp"]),
        event_time: timestamp_at(object, &["eventTime"]),
        reason: str_at(object, &["reason"]),
        event_type: str_at(object, &["type"]),
        action: str_at(object, &["action"]),
        count: i64_at(object, &["count"]),
        reporting_controller: {
            let rc = str_at(object, &["reportingComponent"]);
            if rc.is_empty() {
                str_at(object, &["source", "component"])
            } else {
                rc
            }
        },
        reporting_instance: str_at(object, &["reportingInstance"]),
        message: str_at(object, &["message"]),
        cluster_name: String::new(),
        involved_object: InvolvedObjectReference {
            kind: str_at(object, &["involvedObject", "kind"]),
            namespace: str_at(object, &["involvedObject", "namespace"]),
            name: str_at(object, &["involvedObject", "name"]),
            uid: str_at(object, &["involvedObject", "uid"]),
            api_version: str_at(object, &["involvedObject", "apiVersion"]),
            resource_version: str_at(object, &["involvedObject", "resourceVersion"]),
            field_path: str_at(object, &["involvedObject", "fieldPath"]),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            owner_references: Vec::new(),
            deleted: false,
        },
        source: Source {
            component: str_at(object, &["source", "component"]),
            host: str_at(object, &["source", "host"]),
        },
    }
}

/// Age filter (spec.md §4.5 step 3): `t = last_timestamp ?? event_time`. If
/// `t` exists and is older than `max_event_age_seconds`, drop; absent `t`
/// always passes.
pub fn passes_age_filter(event: &Event, max_event_age_seconds: u64, now: DateTime<Utc>) -> bool {
    match event.age_timestamp() {
        None => true,
        Some(t) => {
            let age = now.signed_duration_since(t);
            age.num_seconds() <= max_event_age_seconds as i64
        }
    }
}

fn overlay_value(value: &Value) -> (BTreeMap<String, String>, BTreeMap<String, String>, Vec<Value>, String) {
    let labels = value
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
                .collect()
        })
        .unwrap_or_default();
    let annotations = value
        .get("metadata")
        .and_then(|m| m.get("annotations"))
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
                .collect()
        })
        .unwrap_or_default();
    let owner_references = value
        .get("metadata")
        .and_then(|m| m.get("ownerReferences"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let resource_version = str_at(value, &["metadata", "resourceVersion"]);
    (labels, annotations, owner_references, resource_version)
}

/// Enrichment (spec.md §4.5 step 4): looks up the involved object and
/// overlays labels/annotations/owner references/resource version; a
/// `NotFound` response flags `deleted = true` and keeps the event
/// unenriched otherwise; any other error keeps the event as-is.
pub async fn enrich(event: &mut Event, source: &dyn EventSource) {
    let involved = &event.involved_object;
    let result = source
        .get_involved_object(&involved.api_version, &involved.kind, &involved.namespace, &involved.name)
        .await;

    match result {
        Ok(Some(value)) => {
            let (labels, annotations, owner_references, resource_version) = overlay_value(&value);
            event.involved_object.labels = labels;
            event.involved_object.annotations = annotations;
            event.involved_object.owner_references = owner_references;
            if !resource_version.is_empty() {
                event.involved_object.resource_version = resource_version;
            }
        }
        Ok(None) => {
            event.involved_object.deleted = true;
        }
        Err(err) => {
            debug!(message = "involved object lookup failed, keeping event unenriched", %err);
        }
    }
}

/// Runs the watch-stream consumer as a background task, invoking `callback`
/// for each event that survives the age filter. `stop` cancels the
/// consumer; any message already dispatched to the callback runs to
/// completion.
pub struct Watcher {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl Watcher {
    pub async fn start<F>(
        source: Arc<dyn EventSource>,
        namespace: Option<String>,
        max_event_age_seconds: u64,
        omit_lookup: bool,
        callback: F,
    ) -> Result<Self, SourceError>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut stream = source.watch(namespace.as_deref()).await?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    next = stream.next() => {
                        match next {
                            None => break,
                            Some(Err(err)) => {
                                warn!(message = "watch stream error", %err);
                            }
                            Some(Ok(WatchMessage { kind: WatchKind::Modified | WatchKind::Deleted, .. })) => {
                                trace!(message = "ignoring non-ADDED watch message");
                            }
                            Some(Ok(message)) => {
                                let mut event = event_from_k8s_json(&message.object);
                                if !passes_age_filter(&event, max_event_age_seconds, Utc::now()) {
                                    trace!(message = "dropping stale event", name = %event.name);
                                    continue;
                                }
                                if !omit_lookup {
                                    enrich(&mut event, source.as_ref()).await;
                                }
                                callback(event);
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            handle,
            shutdown: shutdown_tx,
        })
    }

    /// Cancels the consumer and waits for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
