//! Local-directory package fetcher.

use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::lifecycle::InstallOptions;
use crate::manifest::PackageManifest;
use crate::traits::{FetchedPackage, PackageFetcher};

/// Resolves a specifier that names a local directory by copying it under the
/// plugins root. The package name comes from `plugin.json` when present,
/// otherwise from the directory name. Reinstalling an existing name replaces
/// its files wholesale.
pub struct DirectoryFetcher;

#[async_trait]
impl PackageFetcher for DirectoryFetcher {
    async fn fetch(
        &self,
        specifier: &str,
        _options: &InstallOptions,
        plugins_root: &Path,
    ) -> Result<FetchedPackage> {
        let source = Path::new(specifier);
        let metadata = fs::metadata(source)
            .await
            .with_context(|| format!("cannot resolve package '{}'", specifier))?;
        if !metadata.is_dir() {
            bail!("package specifier '{}' is not a directory", specifier);
        }

        let name = match PackageManifest::read_from_dir(source).await? {
            Some(PackageManifest {
                name: Some(name), ..
            }) if !name.trim().is_empty() => name,
            _ => source
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .with_context(|| format!("cannot derive a name from '{}'", specifier))?,
        };

        let install_dir = plugins_root.join(&name);
        if install_dir.exists() {
            fs::remove_dir_all(&install_dir)
                .await
                .with_context(|| format!("failed to clear '{}'", install_dir.display()))?;
        }
        copy_dir(source, &install_dir).await?;
        debug!(
            "fetched package '{}' into {}",
            name,
            install_dir.display()
        );

        Ok(FetchedPackage { name, install_dir })
    }
}

async fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)
        .await
        .with_context(|| format!("failed to create {}", dest.display()))?;

    let mut read_dir = fs::read_dir(src)
        .await
        .with_context(|| format!("failed to read {}", src.display()))?;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        let target = dest.join(entry.file_name());
        if path.is_dir() {
            Box::pin(copy_dir(&path, &target)).await?;
        } else {
            fs::copy(&path, &target)
                .await
                .with_context(|| format!("failed to copy {}", path.display()))?;
        }
    }
    Ok(())
}
