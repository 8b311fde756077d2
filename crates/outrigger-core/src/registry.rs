//! The registry store: sole owner of the in-memory plugin map and the
//! persisted registry file.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::anyhow;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{PluginError, Result};
use crate::record::PluginRecord;
use crate::traits::InstallConfirmer;

/// Name of the registry file under the plugins root.
pub const REGISTRY_FILE_NAME: &str = "plugins.json";

#[derive(Default)]
struct StoreState {
    root: Option<PathBuf>,
    records: HashMap<String, PluginRecord>,
}

/// In-memory plugin map with durable persistence.
///
/// All mutation and every persist happen under one async mutex, so a
/// mutate-then-persist pair is a single critical section: two concurrent
/// writers can never interleave persist calls such that the file reflects a
/// stale intermediate state.
#[derive(Default)]
pub struct RegistryStore {
    state: Mutex<StoreState>,
    confirmer: RwLock<Option<Arc<dyn InstallConfirmer>>>,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active plugins root. Assigned by `LifecycleEngine::load`.
    pub async fn root(&self) -> Option<PathBuf> {
        self.state.lock().await.root.clone()
    }

    pub(crate) async fn set_root(&self, root: PathBuf) {
        self.state.lock().await.root = Some(root);
    }

    /// Look up a record by name.
    pub async fn get(&self, name: &str) -> Result<PluginRecord> {
        let state = self.state.lock().await;
        state
            .records
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    /// All records, in no particular order.
    pub async fn list(&self) -> Vec<PluginRecord> {
        let state = self.state.lock().await;
        state.records.values().cloned().collect()
    }

    /// Records that are active and not marked for removal.
    pub async fn list_active(&self) -> Vec<PluginRecord> {
        let state = self.state.lock().await;
        state
            .records
            .values()
            .filter(|record| record.active && !record.pending_removal)
            .cloned()
            .collect()
    }

    /// Insert or replace a record by name. Last write wins: an existing
    /// record for the same name is replaced entirely, never merged.
    pub async fn put(&self, record: PluginRecord, persist: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.records.insert(record.name.clone(), record);
        if persist {
            persist_locked(&state).await?;
        }
        Ok(())
    }

    /// Delete a record by name. Returns whether an entry existed; only
    /// persists when something actually changed.
    pub async fn remove(&self, name: &str, persist: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        let existed = state.records.remove(name).is_some();
        if existed && persist {
            persist_locked(&state).await?;
        }
        Ok(existed)
    }

    /// Drop every record without touching the file. Used by the load pass,
    /// which rebuilds the map and persists once at the end.
    pub(crate) async fn clear(&self) {
        self.state.lock().await.records.clear();
    }

    /// Full-state write of the registry file. Callers must not assume
    /// durability until this returns.
    pub async fn persist(&self) -> Result<()> {
        let state = self.state.lock().await;
        persist_locked(&state).await
    }

    /// Register the process-wide install gate.
    pub fn set_install_confirmer(&self, confirmer: Arc<dyn InstallConfirmer>) {
        // The slot is a plain pointer swap; a poisoned lock is still usable.
        *self
            .confirmer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(confirmer);
    }

    pub fn install_confirmer(&self) -> Option<Arc<dyn InstallConfirmer>> {
        self.confirmer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn persist_locked(state: &StoreState) -> Result<()> {
    let root = state.root.as_ref().ok_or_else(|| {
        PluginError::PersistenceFailed(anyhow!("plugins root is not configured"))
    })?;

    fs::create_dir_all(root)
        .await
        .map_err(|e| PluginError::PersistenceFailed(e.into()))?;

    // BTreeMap for a stable on-disk ordering.
    let by_name: BTreeMap<&str, &PluginRecord> = state
        .records
        .iter()
        .map(|(name, record)| (name.as_str(), record))
        .collect();
    let json = serde_json::to_vec_pretty(&by_name)
        .map_err(|e| PluginError::PersistenceFailed(e.into()))?;

    let path = root.join(REGISTRY_FILE_NAME);
    fs::write(&path, json)
        .await
        .map_err(|e| PluginError::PersistenceFailed(e.into()))?;

    debug!(
        "persisted {} plugin record(s) to {}",
        state.records.len(),
        path.display()
    );
    Ok(())
}
