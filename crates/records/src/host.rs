//! Contract with the host that owns entry containers, plus an in-memory host.

use crate::{Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Options passed through to the host's save path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Do not broadcast a settings-updated event; the caller re-syncs locally.
    pub skip_broadcast: bool,
}

/// Keyed-document access the record stores depend on.
#[async_trait]
pub trait HostDocuments: Send + Sync {
    /// Current copy of the named container document.
    fn container(&self, name: &str) -> Result<Option<Value>>;

    /// Persist a whole container document.
    async fn save_container(&self, name: &str, document: Value, options: SaveOptions)
        -> Result<()>;

    /// Name of the container currently loaded in the host session.
    fn active_container_name(&self) -> Option<String>;

    /// Mirror a group list into the live session settings object.
    fn update_live_groups(&self, storage_key: &str, groups: &[Value]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    pub name: String,
    pub options: SaveOptions,
}

#[derive(Debug, Default)]
struct MemoryHostState {
    containers: BTreeMap<String, Value>,
    live: BTreeMap<String, Vec<Value>>,
    active: Option<String>,
    saves: Vec<SaveRecord>,
    fail_saves: bool,
}

/// Host backed by in-process maps. Used by tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<MemoryHostState>,
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_container(self, name: &str, document: Value) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.containers.insert(name.to_string(), document);
        }
        self
    }

    #[must_use]
    pub fn with_active(self, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.active = Some(name.to_string());
        }
        self
    }

    pub fn set_active(&self, name: Option<&str>) {
        if let Ok(mut state) = self.state.lock() {
            state.active = name.map(str::to_string);
        }
    }

    pub fn put_container(&self, name: &str, document: Value) {
        if let Ok(mut state) = self.state.lock() {
            state.containers.insert(name.to_string(), document);
        }
    }

    /// Make every subsequent save fail.
    pub fn fail_saves(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_saves = fail;
        }
    }

    #[must_use]
    pub fn live_groups(&self, storage_key: &str) -> Option<Vec<Value>> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.live.get(storage_key).cloned())
    }

    #[must_use]
    pub fn saves(&self) -> Vec<SaveRecord> {
        self.state
            .lock()
            .map(|state| state.saves.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryHostState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::host("memory host lock poisoned"))
    }
}

#[async_trait]
impl HostDocuments for MemoryHost {
    fn container(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.containers.get(name).cloned())
    }

    async fn save_container(
        &self,
        name: &str,
        document: Value,
        options: SaveOptions,
    ) -> Result<()> {
        let mut state = self.lock()?;
        if state.fail_saves {
            return Err(StoreError::host(format!("save of {name} rejected")));
        }
        state.containers.insert(name.to_string(), document);
        state.saves.push(SaveRecord {
            name: name.to_string(),
            options,
        });
        Ok(())
    }

    fn active_container_name(&self) -> Option<String> {
        self.state.lock().ok().and_then(|state| state.active.clone())
    }

    fn update_live_groups(&self, storage_key: &str, groups: &[Value]) -> Result<()> {
        self.lock()?
            .live
            .insert(storage_key.to_string(), groups.to_vec());
        Ok(())
    }
}
