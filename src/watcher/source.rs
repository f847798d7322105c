//! The external Kubernetes contract the watcher depends on (spec.md §6):
//! two operations, `watch` and `get_involved_object`. Binding this trait to
//! a real cluster client is left to an operator — wiring a production
//! Kubernetes client is out of scope here; `mock` below is the in-memory
//! double the watcher itself is tested against.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum SourceError {
    #[snafu(display("watch stream error: {reason}"))]
    Stream { reason: String },
    #[snafu(display("get_involved_object error: {reason}"))]
    GetInvolvedObject { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Added,
    Modified,
    Deleted,
}

/// One message off the watch stream: a change notification plus the raw
/// Kubernetes Event resource JSON.
#[derive(Debug, Clone)]
pub struct WatchMessage {
    pub kind: WatchKind,
    pub object: Value,
}

/// The external Kubernetes client contract (spec.md §6): a watch stream of
/// Event resources, and point lookups of an arbitrary involved object.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn watch(&self, namespace: Option<&str>) -> Result<BoxStream<'static, Result<WatchMessage, SourceError>>, SourceError>;

    /// Looks up the current state of an object by coordinates. `Ok(None)`
    /// means the Kubernetes API answered `NotFound`; any other failure is
    /// `Err`.
    async fn get_involved_object(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>, SourceError>;
}
