//! Host backed by one JSON file on disk.
//!
//! ```json
//! {
//!   "active": "Default",
//!   "containers": {
//!     "Default": { "prompt_order": [{ "identifier": "main", "enabled": true }] }
//!   },
//!   "live": {},
//!   "books": { "Lore": [10, 11, 12] }
//! }
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use grouping_interaction::{EntryToggles, InteractionError};
use grouping_records::{HostDocuments, SaveOptions, StoreError};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const PROMPT_ORDER_KEY: &str = "prompt_order";

#[derive(Debug, Default, Serialize, Deserialize)]
struct HostFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active: Option<String>,
    #[serde(default)]
    containers: BTreeMap<String, Value>,
    /// Live-session copies of group lists, by storage key.
    #[serde(default)]
    live: BTreeMap<String, Vec<Value>>,
    /// Entry uids of each world book, in display order.
    #[serde(default)]
    books: BTreeMap<String, Vec<u64>>,
}

pub struct FileHost {
    path: PathBuf,
    state: Mutex<HostFile>,
}

impl FileHost {
    pub fn open(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read host file {}", path.display()))?;
        let state: HostFile = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid host file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    /// Entry identifiers of a prompt container in display order.
    pub fn ordered_keys(&self, container: &str) -> Result<Vec<String>> {
        let state = self.lock();
        let document = state
            .containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        Ok(prompt_order(document)
            .filter_map(|entry| entry.get("identifier").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    pub fn book_entries(&self, book: &str) -> Vec<u64> {
        self.lock().books.get(book).cloned().unwrap_or_default()
    }

    pub fn active(&self) -> Option<String> {
        self.lock().active.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HostFile> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, state: &HostFile) -> grouping_records::Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        std::fs::write(&self.path, bytes)
            .map_err(|err| StoreError::host(format!("write {}: {err}", self.path.display())))?;
        debug!("wrote {}", self.path.display());
        Ok(())
    }

    fn enabled_of(&self, container: &str, key: &str) -> Option<bool> {
        let state = self.lock();
        let document = state.containers.get(container)?;
        let entry = prompt_order(document).find(|entry| {
            entry.get("identifier").and_then(Value::as_str) == Some(key)
        })?;
        Some(entry.get("enabled").and_then(Value::as_bool).unwrap_or(true))
    }

    fn set_enabled(&self, container: &str, keys: &[String], enabled: bool) -> grouping_records::Result<usize> {
        let mut state = self.lock();
        let document = state
            .containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        let mut changed = 0;
        if let Some(order) = document.get_mut(PROMPT_ORDER_KEY).and_then(Value::as_array_mut) {
            for entry in order.iter_mut() {
                let matches = entry
                    .get("identifier")
                    .and_then(Value::as_str)
                    .is_some_and(|id| keys.iter().any(|k| k == id));
                if let (true, Some(obj)) = (matches, entry.as_object_mut()) {
                    obj.insert("enabled".to_string(), Value::Bool(enabled));
                    changed += 1;
                }
            }
        }
        self.flush(&state)?;
        Ok(changed)
    }
}

fn prompt_order(document: &Value) -> impl Iterator<Item = &Value> {
    document
        .get(PROMPT_ORDER_KEY)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

#[async_trait]
impl HostDocuments for FileHost {
    fn container(&self, name: &str) -> grouping_records::Result<Option<Value>> {
        Ok(self.lock().containers.get(name).cloned())
    }

    async fn save_container(
        &self,
        name: &str,
        document: Value,
        options: SaveOptions,
    ) -> grouping_records::Result<()> {
        let mut state = self.lock();
        state.containers.insert(name.to_string(), document);
        debug!(
            "saved container {name} (broadcast: {})",
            !options.skip_broadcast
        );
        self.flush(&state)
    }

    fn active_container_name(&self) -> Option<String> {
        self.active()
    }

    fn update_live_groups(&self, storage_key: &str, groups: &[Value]) -> grouping_records::Result<()> {
        let mut state = self.lock();
        state.live.insert(storage_key.to_string(), groups.to_vec());
        self.flush(&state)
    }
}

/// Enabled flags of one prompt container, with a batch write path.
pub struct ContainerToggles {
    host: Arc<FileHost>,
    container: String,
}

impl ContainerToggles {
    pub fn new(host: Arc<FileHost>, container: &str) -> Self {
        Self {
            host,
            container: container.to_string(),
        }
    }
}

#[async_trait]
impl EntryToggles for ContainerToggles {
    fn is_enabled(&self, key: &str) -> Option<bool> {
        self.host.enabled_of(&self.container, key)
    }

    async fn set_enabled_batch(
        &self,
        keys: &[String],
        enabled: bool,
    ) -> grouping_interaction::Result<bool> {
        let changed = self.host.set_enabled(&self.container, keys, enabled)?;
        debug!("batch set {changed} entries enabled={enabled}");
        Ok(true)
    }

    async fn toggle_entry(&self, key: &str) -> grouping_interaction::Result<()> {
        let current = self
            .is_enabled(key)
            .ok_or_else(|| InteractionError::host(format!("unknown entry {key}")))?;
        self.host
            .set_enabled(&self.container, &[key.to_string()], !current)?;
        Ok(())
    }
}

/// Empty host document with one prompt container.
pub fn scaffold(container: &str, keys: &[String]) -> Value {
    let order: Vec<Value> = keys
        .iter()
        .map(|key| {
            let mut entry = Map::new();
            entry.insert("identifier".to_string(), Value::String(key.clone()));
            entry.insert("enabled".to_string(), Value::Bool(true));
            Value::Object(entry)
        })
        .collect();
    let mut containers = Map::new();
    containers.insert(
        container.to_string(),
        serde_json::json!({ PROMPT_ORDER_KEY: order }),
    );
    serde_json::json!({
        "active": container,
        "containers": containers,
        "live": {},
        "books": {},
    })
}
