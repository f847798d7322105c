use serde::{Deserialize, Serialize};

/// The Kubernetes `EventSource` sub-object: which component and host
/// reported the event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub host: String,
}
