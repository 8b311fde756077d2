//! Collaborator seams: install confirmation and package fetching.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

use crate::lifecycle::InstallOptions;

/// Gate consulted before any install proceeds.
///
/// Supplied by the embedding host (typically a user-facing confirmation
/// dialog). Installs fail with `NotConfigured` until one is registered.
#[async_trait]
pub trait InstallConfirmer: Send + Sync {
    async fn confirm(&self, specifier: &str) -> Result<bool>;
}

/// Resolves an install specifier into a package directory under the plugins
/// root. Resolution failures abort the install; nothing is registered.
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    async fn fetch(
        &self,
        specifier: &str,
        options: &InstallOptions,
        plugins_root: &Path,
    ) -> Result<FetchedPackage>;
}

/// The result of a successful fetch: the resolved package name and where its
/// files landed.
#[derive(Debug, Clone)]
pub struct FetchedPackage {
    pub name: String,
    pub install_dir: PathBuf,
}

/// Confirmer with a fixed answer. Useful for tests and for headless
/// deployments that pre-approve installs.
pub struct StaticConfirmer(pub bool);

#[async_trait]
impl InstallConfirmer for StaticConfirmer {
    async fn confirm(&self, _specifier: &str) -> Result<bool> {
        Ok(self.0)
    }
}
