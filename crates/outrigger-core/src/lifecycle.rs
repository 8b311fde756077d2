//! Install/activate/uninstall transitions and the startup load pass.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result as AnyResult};
use serde::Deserialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{PluginError, Result};
use crate::manifest::PackageManifest;
use crate::record::PluginRecord;
use crate::registry::{RegistryStore, REGISTRY_FILE_NAME};
use crate::traits::PackageFetcher;

/// Caller-supplied install knobs, also accepted over the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallOptions {
    /// Persist the registry immediately after registering the record.
    pub persist: bool,
    /// Version constraint handed through to the package fetcher.
    pub version: Option<String>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            persist: true,
            version: None,
        }
    }
}

/// Orchestrates plugin state transitions against the registry store.
///
/// Installs are serialized through one mutex so two requests cannot race
/// past the confirmer; everything else relies on the store's own critical
/// section.
pub struct LifecycleEngine {
    store: Arc<RegistryStore>,
    fetcher: Arc<dyn PackageFetcher>,
    install_lock: Mutex<()>,
}

impl LifecycleEngine {
    pub fn new(store: Arc<RegistryStore>, fetcher: Arc<dyn PackageFetcher>) -> Self {
        Self {
            store,
            fetcher,
            install_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.store
    }

    /// Install a plugin: confirm, fetch, register.
    ///
    /// The confirmer runs before any code is fetched; a rejection or
    /// confirmer failure aborts with nothing on disk and nothing registered.
    /// Installing a name that is already registered replaces the prior
    /// record entirely.
    pub async fn install(
        &self,
        specifier: &str,
        options: InstallOptions,
    ) -> Result<PluginRecord> {
        let _guard = self.install_lock.lock().await;

        let confirmer = self
            .store
            .install_confirmer()
            .ok_or(PluginError::NotConfigured)?;
        match confirmer.confirm(specifier).await {
            Ok(true) => {}
            Ok(false) => return Err(PluginError::InstallRejected(specifier.to_string())),
            Err(err) => {
                warn!("install confirmer failed for '{}': {:#}", specifier, err);
                return Err(PluginError::InstallRejected(specifier.to_string()));
            }
        }

        let root = self.store.root().await.ok_or_else(|| {
            PluginError::PersistenceFailed(anyhow::anyhow!("plugins root is not configured"))
        })?;

        let fetched = self
            .fetcher
            .fetch(specifier, &options, &root)
            .await
            .map_err(|source| PluginError::FetchFailed {
                specifier: specifier.to_string(),
                source,
            })?;

        if let Err(err) = validate_plugin_name(&fetched.name) {
            // Don't leave an unregistered package behind.
            if fetched.install_dir.starts_with(&root) && fetched.install_dir.exists() {
                let _ = fs::remove_dir_all(&fetched.install_dir).await;
            }
            return Err(PluginError::FetchFailed {
                specifier: specifier.to_string(),
                source: err,
            });
        }

        let mut record = PluginRecord::new(fetched.name.clone(), specifier);
        record.dependencies = resolve_dependencies(&fetched.install_dir).await;

        self.store.put(record.clone(), options.persist).await?;
        info!("installed plugin '{}' from '{}'", record.name, specifier);
        Ok(record)
    }

    /// Mark a plugin active so its capability hooks run. No-op if already
    /// active.
    pub async fn activate(&self, name: &str) -> Result<()> {
        let mut record = self.store.get(name).await?;
        if record.active {
            return Ok(());
        }
        record.active = true;
        self.store.put(record, true).await?;
        info!("activated plugin '{}'", name);
        Ok(())
    }

    /// Mark a plugin inactive. Teardown of its hooks is the host's job.
    pub async fn deactivate(&self, name: &str) -> Result<()> {
        let mut record = self.store.get(name).await?;
        if !record.active {
            return Ok(());
        }
        record.active = false;
        self.store.put(record, true).await?;
        info!("deactivated plugin '{}'", name);
        Ok(())
    }

    /// Remove a plugin.
    ///
    /// Immediate removal deletes the record and its files now. Deferred
    /// removal only marks the record; its files may still be in use by the
    /// running host, so deletion waits for the next load pass.
    pub async fn uninstall(&self, name: &str, immediate: bool) -> Result<()> {
        if immediate {
            let record = self.store.get(name).await?;
            // Files first: if the delete fails the record must survive, or
            // the caller is told "removed" while orphaned files remain.
            if let Some(root) = self.store.root().await {
                let dir = root.join(&record.name);
                if dir.exists() {
                    fs::remove_dir_all(&dir).await.map_err(|e| {
                        PluginError::PersistenceFailed(anyhow::Error::new(e).context(
                            format!("failed to delete plugin directory {}", dir.display()),
                        ))
                    })?;
                }
            }
            self.store.remove(name, true).await?;
            info!("uninstalled plugin '{}'", name);
        } else {
            let mut record = self.store.get(name).await?;
            record.pending_removal = true;
            self.store.put(record, true).await?;
            info!("plugin '{}' marked for removal on next load", name);
        }
        Ok(())
    }

    /// Startup/reset entry point: rebuild the registry from the persisted
    /// file under `plugins_root`.
    ///
    /// Entries marked for removal have their folders deleted and are
    /// dropped; everything else is reconstructed with dependencies
    /// recomputed. Any entry that fails reconstruction fails the whole load
    /// — silently dropping plugins would hide user-installed state. The
    /// rebuilt registry is persisted once as a single batched write.
    pub async fn load(&self, plugins_root: impl Into<PathBuf>) -> Result<()> {
        let root = plugins_root.into();
        self.store.set_root(root.clone()).await;
        self.store.clear().await;

        let file = root.join(REGISTRY_FILE_NAME);
        if file.exists() {
            let bytes = fs::read(&file).await.map_err(|e| {
                PluginError::LoadCorrupted(format!("failed to read {}: {}", file.display(), e))
            })?;
            let entries: BTreeMap<String, PluginRecord> = serde_json::from_slice(&bytes)
                .map_err(|e| {
                    PluginError::LoadCorrupted(format!(
                        "failed to parse {}: {}",
                        file.display(),
                        e
                    ))
                })?;

            // Validate every entry before the store sees any of them: a
            // corrupt entry must fail the whole load, not leave a partially
            // rebuilt registry behind.
            let mut staged = Vec::new();
            let mut doomed = Vec::new();
            for (key, record) in entries {
                if record.name != key {
                    return Err(PluginError::LoadCorrupted(format!(
                        "registry key '{}' does not match record name '{}'",
                        key, record.name
                    )));
                }
                validate_plugin_name(&record.name)
                    .map_err(|e| PluginError::LoadCorrupted(e.to_string()))?;

                if record.pending_removal {
                    doomed.push(record.name);
                } else {
                    staged.push(record);
                }
            }

            for name in doomed {
                let dir = root.join(&name);
                if dir.exists() {
                    fs::remove_dir_all(&dir).await.map_err(|e| {
                        PluginError::LoadCorrupted(format!(
                            "failed to delete '{}' marked for removal: {}",
                            dir.display(),
                            e
                        ))
                    })?;
                }
                debug!("dropped plugin '{}' marked for removal", name);
            }

            for mut record in staged {
                record.dependencies = resolve_dependencies(&root.join(&record.name)).await;
                self.store.put(record, false).await?;
            }
        }

        self.store.persist().await?;
        info!(
            "loaded {} plugin(s) from {}",
            self.store.list().await.len(),
            root.display()
        );
        Ok(())
    }
}

/// Derived data only: manifest problems degrade to empty dependencies
/// instead of failing the surrounding operation.
async fn resolve_dependencies(install_dir: &Path) -> BTreeMap<String, String> {
    match PackageManifest::read_from_dir(install_dir).await {
        Ok(Some(manifest)) => manifest.dependencies,
        Ok(None) => BTreeMap::new(),
        Err(err) => {
            warn!(
                "ignoring unreadable manifest in {}: {:#}",
                install_dir.display(),
                err
            );
            BTreeMap::new()
        }
    }
}

/// A plugin name doubles as its folder name, so it must be a single normal
/// path component.
fn validate_plugin_name(name: &str) -> AnyResult<()> {
    if name.trim().is_empty() {
        bail!("plugin name cannot be empty");
    }

    let candidate = Path::new(name);
    let mut components = candidate.components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if !single_normal {
        bail!("plugin name '{}' is not a valid folder name", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::DirectoryFetcher;
    use crate::traits::{InstallConfirmer, StaticConfirmer};
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct FailingConfirmer;

    #[async_trait]
    impl InstallConfirmer for FailingConfirmer {
        async fn confirm(&self, _specifier: &str) -> AnyResult<bool> {
            bail!("dialog backend unavailable")
        }
    }

    fn engine() -> LifecycleEngine {
        LifecycleEngine::new(Arc::new(RegistryStore::new()), Arc::new(DirectoryFetcher))
    }

    async fn write_package(dir: &Path, name: &str) -> PathBuf {
        let package = dir.join(format!("{}-src", name));
        fs::create_dir_all(&package).await.expect("package dir");
        fs::write(
            package.join(PackageManifest::FILE_NAME),
            format!(r#"{{"name": "{}", "dependencies": {{"helper": "^1.2"}}}}"#, name),
        )
        .await
        .expect("manifest");
        fs::write(package.join("index.js"), "module.exports = {}\n")
            .await
            .expect("entry file");
        package
    }

    #[tokio::test]
    async fn install_without_confirmer_fails_and_registers_nothing() {
        let temp = tempdir().expect("tempdir");
        let engine = engine();
        engine.load(temp.path().join("plugins")).await.expect("load");

        let err = engine
            .install("/nowhere", InstallOptions::default())
            .await
            .expect_err("should fail");
        assert!(matches!(err, PluginError::NotConfigured));
        assert!(engine.store().list().await.is_empty());
    }

    #[tokio::test]
    async fn rejected_install_registers_nothing() {
        let temp = tempdir().expect("tempdir");
        let engine = engine();
        engine.load(temp.path().join("plugins")).await.expect("load");
        engine
            .store()
            .set_install_confirmer(Arc::new(StaticConfirmer(false)));

        let package = write_package(temp.path(), "foo").await;
        let err = engine
            .install(package.to_str().unwrap(), InstallOptions::default())
            .await
            .expect_err("should fail");
        assert!(matches!(err, PluginError::InstallRejected(_)));
        assert!(engine.store().list().await.is_empty());
    }

    #[tokio::test]
    async fn confirmer_error_aborts_install() {
        let temp = tempdir().expect("tempdir");
        let engine = engine();
        engine.load(temp.path().join("plugins")).await.expect("load");
        engine
            .store()
            .set_install_confirmer(Arc::new(FailingConfirmer));

        let package = write_package(temp.path(), "foo").await;
        let err = engine
            .install(package.to_str().unwrap(), InstallOptions::default())
            .await
            .expect_err("should fail");
        assert!(matches!(err, PluginError::InstallRejected(_)));
        assert!(engine.store().list().await.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_registers_nothing() {
        let temp = tempdir().expect("tempdir");
        let engine = engine();
        engine.load(temp.path().join("plugins")).await.expect("load");
        engine
            .store()
            .set_install_confirmer(Arc::new(StaticConfirmer(true)));

        let missing = temp.path().join("does-not-exist");
        let err = engine
            .install(missing.to_str().unwrap(), InstallOptions::default())
            .await
            .expect_err("should fail");
        assert!(matches!(err, PluginError::FetchFailed { .. }));
        assert!(engine.store().list().await.is_empty());
    }

    #[tokio::test]
    async fn install_activate_survives_reload() {
        let temp = tempdir().expect("tempdir");
        let plugins_root = temp.path().join("plugins");

        let engine = engine();
        engine.load(&plugins_root).await.expect("load empty root");
        assert!(engine.store().list().await.is_empty());

        engine
            .store()
            .set_install_confirmer(Arc::new(StaticConfirmer(true)));
        let package = write_package(temp.path(), "foo").await;
        let record = engine
            .install(package.to_str().unwrap(), InstallOptions::default())
            .await
            .expect("install");
        assert_eq!(record.name, "foo");
        assert!(!record.active);
        assert_eq!(record.dependencies["helper"], "^1.2");
        assert!(plugins_root.join("foo").join("index.js").exists());

        engine.activate("foo").await.expect("activate");
        assert_eq!(engine.store().list_active().await.len(), 1);

        // Simulated restart: fresh store + engine pointed at the same root.
        let restarted =
            LifecycleEngine::new(Arc::new(RegistryStore::new()), Arc::new(DirectoryFetcher));
        restarted.load(&plugins_root).await.expect("reload");

        let active = restarted.store().list_active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "foo");
        assert_eq!(active[0].dependencies["helper"], "^1.2");
    }

    #[tokio::test]
    async fn duplicate_install_replaces_the_record() {
        let temp = tempdir().expect("tempdir");
        let plugins_root = temp.path().join("plugins");
        let engine = engine();
        engine.load(&plugins_root).await.expect("load");
        engine
            .store()
            .set_install_confirmer(Arc::new(StaticConfirmer(true)));

        let package = write_package(temp.path(), "foo").await;
        let specifier = package.to_str().unwrap().to_string();
        engine
            .install(&specifier, InstallOptions::default())
            .await
            .expect("first install");
        engine.activate("foo").await.expect("activate");

        let record = engine
            .install(&specifier, InstallOptions::default())
            .await
            .expect("reinstall");
        assert!(!record.active, "reinstall yields a fresh inactive record");
        assert_eq!(engine.store().list().await.len(), 1);
    }

    #[tokio::test]
    async fn deferred_removal_keeps_files_until_next_load() {
        let temp = tempdir().expect("tempdir");
        let plugins_root = temp.path().join("plugins");
        let engine = engine();
        engine.load(&plugins_root).await.expect("load");
        engine
            .store()
            .set_install_confirmer(Arc::new(StaticConfirmer(true)));

        let package = write_package(temp.path(), "foo").await;
        engine
            .install(package.to_str().unwrap(), InstallOptions::default())
            .await
            .expect("install");
        engine.activate("foo").await.expect("activate");

        engine.uninstall("foo", false).await.expect("uninstall");
        assert!(engine.store().list_active().await.is_empty());
        assert!(plugins_root.join("foo").exists(), "files survive until load");

        engine.load(&plugins_root).await.expect("reload");
        assert!(engine.store().list().await.is_empty());
        assert!(!plugins_root.join("foo").exists(), "files gone after load");
    }

    #[tokio::test]
    async fn immediate_uninstall_removes_files_now() {
        let temp = tempdir().expect("tempdir");
        let plugins_root = temp.path().join("plugins");
        let engine = engine();
        engine.load(&plugins_root).await.expect("load");
        engine
            .store()
            .set_install_confirmer(Arc::new(StaticConfirmer(true)));

        let package = write_package(temp.path(), "foo").await;
        engine
            .install(package.to_str().unwrap(), InstallOptions::default())
            .await
            .expect("install");

        engine.uninstall("foo", true).await.expect("uninstall");
        assert!(engine.store().list().await.is_empty());
        assert!(!plugins_root.join("foo").exists());
    }

    #[tokio::test]
    async fn uninstall_unknown_plugin_is_not_found() {
        let temp = tempdir().expect("tempdir");
        let engine = engine();
        engine.load(temp.path().join("plugins")).await.expect("load");

        let err = engine.uninstall("ghost", true).await.expect_err("fail");
        assert!(matches!(err, PluginError::NotFound(_)));
    }

    #[tokio::test]
    async fn corrupted_registry_file_fails_the_load() {
        let temp = tempdir().expect("tempdir");
        let plugins_root = temp.path().join("plugins");
        fs::create_dir_all(&plugins_root).await.expect("root");
        fs::write(plugins_root.join(REGISTRY_FILE_NAME), b"not json at all")
            .await
            .expect("write garbage");

        let engine = engine();
        let err = engine.load(&plugins_root).await.expect_err("should fail");
        assert!(matches!(err, PluginError::LoadCorrupted(_)));
    }

    #[tokio::test]
    async fn failed_load_leaves_no_partial_registry() {
        let temp = tempdir().expect("tempdir");
        let plugins_root = temp.path().join("plugins");
        fs::create_dir_all(&plugins_root).await.expect("root");
        // "aaa" is fine; "bbb" has a mismatched record name and must sink
        // the whole load, including the entry processed before it.
        fs::write(
            plugins_root.join(REGISTRY_FILE_NAME),
            r#"{
                "aaa": {"name": "aaa", "source": "/src/aaa", "active": true},
                "bbb": {"name": "zzz", "source": "/src/bbb"}
            }"#,
        )
        .await
        .expect("write registry");

        let engine = engine();
        let err = engine.load(&plugins_root).await.expect_err("should fail");
        assert!(matches!(err, PluginError::LoadCorrupted(_)));
        assert!(
            engine.store().list().await.is_empty(),
            "a failed load must not surface a partial registry"
        );
    }

    #[tokio::test]
    async fn failed_directory_delete_keeps_the_record() {
        let temp = tempdir().expect("tempdir");
        let plugins_root = temp.path().join("plugins");
        let engine = engine();
        engine.load(&plugins_root).await.expect("load");
        engine
            .store()
            .set_install_confirmer(Arc::new(StaticConfirmer(true)));

        let package = write_package(temp.path(), "foo").await;
        engine
            .install(package.to_str().unwrap(), InstallOptions::default())
            .await
            .expect("install");

        // Swap the plugin directory for a plain file so the recursive
        // delete fails.
        fs::remove_dir_all(plugins_root.join("foo"))
            .await
            .expect("clear dir");
        fs::write(plugins_root.join("foo"), "not a directory")
            .await
            .expect("decoy file");

        let err = engine.uninstall("foo", true).await.expect_err("should fail");
        assert!(matches!(err, PluginError::PersistenceFailed(_)));
        assert!(
            engine.store().get("foo").await.is_ok(),
            "record survives a failed file delete"
        );
    }

    #[tokio::test]
    async fn mismatched_registry_key_fails_the_load() {
        let temp = tempdir().expect("tempdir");
        let plugins_root = temp.path().join("plugins");
        fs::create_dir_all(&plugins_root).await.expect("root");
        fs::write(
            plugins_root.join(REGISTRY_FILE_NAME),
            r#"{"foo": {"name": "bar", "source": "x"}}"#,
        )
        .await
        .expect("write registry");

        let engine = engine();
        let err = engine.load(&plugins_root).await.expect_err("should fail");
        assert!(matches!(err, PluginError::LoadCorrupted(_)));
    }

    #[tokio::test]
    async fn activate_twice_is_a_no_op() {
        let temp = tempdir().expect("tempdir");
        let plugins_root = temp.path().join("plugins");
        let engine = engine();
        engine.load(&plugins_root).await.expect("load");
        engine
            .store()
            .set_install_confirmer(Arc::new(StaticConfirmer(true)));

        let package = write_package(temp.path(), "foo").await;
        engine
            .install(package.to_str().unwrap(), InstallOptions::default())
            .await
            .expect("install");

        engine.activate("foo").await.expect("first");
        engine.activate("foo").await.expect("second");
        assert_eq!(engine.store().list_active().await.len(), 1);
    }
}
