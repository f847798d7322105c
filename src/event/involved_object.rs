use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A reference to the Kubernetes object that an [`super::Event`] is about,
/// enriched (unless `omitLookup` is set) with the object's current labels,
/// annotations, owner references and resource version.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvolvedObjectReference {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub api_version: String,
    pub resource_version: String,
    pub field_path: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Opaque: the engine never inspects owner reference contents, only
    /// carries them through to sinks that serialize the whole object.
    #[serde(default)]
    pub owner_references: Vec<serde_json::Value>,
    /// Set by the watcher when enrichment's `get_resource` lookup returns
    /// `NotFound` — the involved object no longer exists.
    #[serde(default)]
    pub deleted: bool,
}
