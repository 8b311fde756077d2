//! Error types for the plugin registry.

use thiserror::Error;

/// Failures surfaced by registry, lifecycle, and asset operations.
///
/// `NotFound`, `InstallRejected`, and `FetchFailed` are recoverable for the
/// caller — the registry stays consistent. `LoadCorrupted` during startup and
/// `PersistenceFailed` during a mutation must propagate: a caller is never
/// told an operation succeeded when the durable file does not reflect it.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin '{0}' is not registered")]
    NotFound(String),

    #[error("no install confirmer is configured")]
    NotConfigured,

    #[error("install of '{0}' was rejected")]
    InstallRejected(String),

    #[error("failed to fetch package '{specifier}'")]
    FetchFailed {
        specifier: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist the plugin registry")]
    PersistenceFailed(#[source] anyhow::Error),

    #[error("plugin registry is corrupted: {0}")]
    LoadCorrupted(String),

    #[error("invalid asset path: {0}")]
    InvalidAssetPath(String),
}

impl PluginError {
    /// Stable machine-readable kind, used in bridge error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            PluginError::NotFound(_) => "NotFound",
            PluginError::NotConfigured => "NotConfigured",
            PluginError::InstallRejected(_) => "InstallRejected",
            PluginError::FetchFailed { .. } => "FetchFailed",
            PluginError::PersistenceFailed(_) => "PersistenceFailed",
            PluginError::LoadCorrupted(_) => "LoadCorrupted",
            PluginError::InvalidAssetPath(_) => "InvalidAssetPath",
        }
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
