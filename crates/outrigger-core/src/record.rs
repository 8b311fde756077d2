//! The unit of registry state: one installed plugin.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single installed plugin as tracked by the registry.
///
/// The serialized form is exactly what lands in the registry file. Field
/// names are camelCase on disk to match the bridge contract. Anything that
/// can be recomputed from the installed package is skipped during
/// serialization and rebuilt on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRecord {
    /// Unique identity, also the folder name under the plugins root.
    pub name: String,
    /// The original install specifier (local path or package reference).
    pub source: String,
    /// Whether the plugin's capability hooks are invoked by the host.
    #[serde(default)]
    pub active: bool,
    /// Marked for deletion on the next load pass instead of immediately.
    #[serde(default)]
    pub pending_removal: bool,
    /// Persisted fields this version does not model. Preserved explicitly so
    /// a registry file written by a newer build round-trips without loss.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Runtime dependencies from the package manifest. Recomputed on load,
    /// never persisted.
    #[serde(skip)]
    pub dependencies: BTreeMap<String, String>,
}

impl PluginRecord {
    /// A freshly installed record: inactive, not marked for removal.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            active: false,
            pending_removal: false,
            extra: BTreeMap::new(),
            dependencies: BTreeMap::new(),
        }
    }
}
