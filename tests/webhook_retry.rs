//! End-to-end coverage for spec.md §8 scenario 4 (webhook retry), driven
//! against a real HTTP mock server the way the teacher's own enterprise
//! tests drive theirs.

use kubesee::event::{Event, InvolvedObjectReference, Source};
use kubesee::sinks::{self, SinkError};
use std::collections::BTreeMap;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_event() -> Event {
    Event {
        name: "my-pod.1".to_owned(),
        namespace: "default".to_owned(),
        uid: "u1".to_owned(),
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
        message: "Pod created".to_owned(),
        cluster_name: String::new(),
        involved_object: InvolvedObjectReference {
            kind: "Pod".to_owned(),
            namespace: "default".to_owned(),
            name: "my-pod".to_owned(),
            uid: "u2".to_owned(),
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

fn webhook_config(endpoint: &str) -> serde_yaml::Value {
    serde_yaml::from_str(&format!("endpoint: \"{endpoint}\"\n")).unwrap()
}

/// Endpoint returns 503 twice then 200 → `send` returns `Ok` after two
/// backoff sleeps.
#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(2)
        .mount(&server)
        .await;

    let sink = sinks::build("webhook", &webhook_config(&server.uri())).await.unwrap();
    sink.send(&sample_event()).await.unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

/// Endpoint returns 400 once → `send` fails immediately with exactly one
/// call; 400 is not in the retryable status set.
#[tokio::test]
async fn unretryable_status_fails_after_exactly_one_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(400)).mount(&server).await;

    let sink = sinks::build("webhook", &webhook_config(&server.uri())).await.unwrap();
    let err = sink.send(&sample_event()).await.unwrap_err();

    assert!(matches!(err, SinkError::UnretryableStatus { status: 400 }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
