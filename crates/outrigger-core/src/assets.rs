//! Asset path resolution under the plugins root.
//!
//! The caller is an untrusted renderer, so this is a trust boundary: request
//! fragments are validated component-by-component before the filesystem is
//! touched, then re-checked after canonicalization so symlinks cannot escape
//! the root either.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{PluginError, Result};
use crate::registry::RegistryStore;

/// Maps `"<plugin>/<relative asset>"` request fragments to absolute paths
/// under the active plugins root.
pub struct AssetGateway {
    store: Arc<RegistryStore>,
}

impl AssetGateway {
    pub fn new(store: Arc<RegistryStore>) -> Self {
        Self { store }
    }

    /// Resolve a request fragment to an existing file under the plugins
    /// root. Traversal attempts and missing files both fail with
    /// `InvalidAssetPath`.
    pub async fn resolve(&self, request_path: &str) -> Result<PathBuf> {
        let root = self.store.root().await.ok_or_else(|| {
            PluginError::InvalidAssetPath("plugins root is not configured".to_string())
        })?;

        let relative = sanitize_relative(request_path)?;

        let canonical_root = root.canonicalize().map_err(|e| {
            PluginError::InvalidAssetPath(format!(
                "plugins root {} is unavailable: {}",
                root.display(),
                e
            ))
        })?;
        let resolved = canonical_root.join(relative).canonicalize().map_err(|_| {
            PluginError::InvalidAssetPath(format!("no such asset: {}", request_path))
        })?;

        if !resolved.starts_with(&canonical_root) {
            return Err(PluginError::InvalidAssetPath(format!(
                "'{}' escapes the plugins root",
                request_path
            )));
        }
        if !resolved.is_file() {
            return Err(PluginError::InvalidAssetPath(format!(
                "'{}' is not a file",
                request_path
            )));
        }

        Ok(resolved)
    }
}

fn sanitize_relative(request_path: &str) -> Result<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    let candidate = Path::new(trimmed);

    if candidate.as_os_str().is_empty() {
        return Err(PluginError::InvalidAssetPath(
            "empty asset path".to_string(),
        ));
    }

    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PluginError::InvalidAssetPath(format!(
                    "path traversal in '{}'",
                    request_path
                )));
            }
        }
    }

    Ok(candidate.to_path_buf())
}
