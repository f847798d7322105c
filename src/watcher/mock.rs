//! An in-memory [`EventSource`] double: tests push watch messages and seed
//! involved-object lookups directly, with no Kubernetes API in sight.

use super::source::{EventSource, SourceError, WatchMessage};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

type ObjectKey = (String, String, String, String);

pub struct MockEventSource {
    sender: mpsc::UnboundedSender<Result<WatchMessage, SourceError>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Result<WatchMessage, SourceError>>>>,
    objects: Mutex<BTreeMap<ObjectKey, Value>>,
}

impl MockEventSource {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Queues a watch message for delivery the next time the stream is
    /// polled.
    pub fn push(&self, message: WatchMessage) {
        let _ = self.sender.send(Ok(message));
    }

    pub fn push_error(&self, reason: &str) {
        let _ = self.sender.send(Err(SourceError::Stream {
            reason: reason.to_owned(),
        }));
    }

    /// Seeds a response for `get_involved_object`.
    pub fn set_object(&self, api_version: &str, kind: &str, namespace: &str, name: &str, value: Value) {
        self.objects.lock().expect("mock mutex poisoned").insert(
            (api_version.to_owned(), kind.to_owned(), namespace.to_owned(), name.to_owned()),
            value,
        );
    }
}

impl Default for MockEventSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn watch(&self, _namespace: Option<&str>) -> Result<BoxStream<'static, Result<WatchMessage, SourceError>>, SourceError> {
        let receiver = self
            .receiver
            .lock()
            .expect("mock mutex poisoned")
            .take()
            .ok_or_else(|| SourceError::Stream {
                reason: "mock event source can only be watched once".to_owned(),
            })?;
        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }

    async fn get_involved_object(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>, SourceError> {
        let key = (api_version.to_owned(), kind.to_owned(), namespace.to_owned(), name.to_owned());
        Ok(self.objects.lock().expect("mock mutex poisoned").get(&key).cloned())
    }
}
