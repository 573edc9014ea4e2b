use crate::config::StoreConfig;
use crate::host::{HostDocuments, SaveOptions};
use crate::model::{display_name, GroupAnchor, GroupRecord};
use crate::normalize::{read_all, to_values};
use crate::{Result, StoreError};
use log::{debug, info};
use serde_json::{Map, Value};
use std::sync::Arc;

const EXTENSIONS_KEY: &str = "extensions";

/// Fields to change on an existing group; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPatch {
    pub start: Option<String>,
    pub end: Option<String>,
    pub name: Option<String>,
}

impl GroupPatch {
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn anchors(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
            name: None,
        }
    }
}

/// Prompt group persistence on top of host container documents.
///
/// Every mutation re-reads the container, normalizes the full list, applies the
/// change and writes the normalized list back, so the stored shape is always
/// self-consistent.
pub struct GroupStore<H: ?Sized> {
    host: Arc<H>,
    config: StoreConfig,
}

impl<H: HostDocuments + ?Sized> GroupStore<H> {
    pub fn new(host: Arc<H>, config: StoreConfig) -> Self {
        Self { host, config }
    }

    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Raw stored group list of a container; empty when nothing is stored yet.
    pub fn raw_groups(&self, container: &str) -> Result<Vec<Value>> {
        let document = self.load(container)?;
        Ok(stored_groups(&document, &self.config.storage_key))
    }

    /// All groups of a container, normalized against `ordered_keys`.
    pub fn read(&self, container: &str, ordered_keys: &[String]) -> Result<Vec<GroupRecord>> {
        let raw = self.raw_groups(container)?;
        Ok(read_all(&raw, ordered_keys, &self.config.default_group_name))
    }

    /// Append a new resolved group.
    pub async fn add(
        &self,
        container: &str,
        start: &str,
        end: &str,
        name: &str,
        ordered_keys: &[String],
    ) -> Result<GroupRecord> {
        let start = require_anchor("start", Some(start))?;
        let end = require_anchor("end", Some(end))?;

        let document = self.load(container)?;
        let mut records = self.normalized(&document, ordered_keys);
        let mut record = GroupRecord::new(name, start, end);
        record.name = display_name(Some(name), &self.config.default_group_name);
        records.push(record.clone());

        self.persist(container, document, &records).await?;
        info!("added group {:?} ({}) to {container}", record.name, record.id);
        Ok(record)
    }

    /// Merge `patch` over the group at `index` of the normalized list.
    pub async fn update(
        &self,
        container: &str,
        index: usize,
        patch: GroupPatch,
        ordered_keys: &[String],
    ) -> Result<GroupRecord> {
        let document = self.load(container)?;
        let mut records = self.normalized(&document, ordered_keys);
        let len = records.len();
        let existing = records
            .get_mut(index)
            .ok_or_else(|| StoreError::index(index, len))?;

        let anchor = merge_anchor(&existing.anchor, &patch)?;
        let name = match patch.name.as_deref() {
            Some(name) => display_name(Some(name), &self.config.default_group_name),
            None => existing.name.clone(),
        };
        existing.anchor = anchor;
        existing.name = name;
        let updated = existing.clone();

        self.persist(container, document, &records).await?;
        debug!("updated group {} in {container}", updated.id);
        Ok(updated)
    }

    /// Remove the group at `index` of the normalized list.
    pub async fn remove(
        &self,
        container: &str,
        index: usize,
        ordered_keys: &[String],
    ) -> Result<GroupRecord> {
        let document = self.load(container)?;
        let mut records = self.normalized(&document, ordered_keys);
        if index >= records.len() {
            return Err(StoreError::index(index, records.len()));
        }
        let removed = records.remove(index);

        self.persist(container, document, &records).await?;
        info!("removed group {:?} ({}) from {container}", removed.name, removed.id);
        Ok(removed)
    }

    /// Rewrite the stored list through normalization, upgrading legacy records
    /// that now resolve. Returns the number of records kept.
    pub async fn migrate(&self, container: &str, ordered_keys: &[String]) -> Result<usize> {
        let document = self.load(container)?;
        let records = self.normalized(&document, ordered_keys);
        let count = records.len();
        self.persist(container, document, &records).await?;
        Ok(count)
    }

    fn load(&self, container: &str) -> Result<Value> {
        self.host
            .container(container)?
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))
    }

    fn normalized(&self, document: &Value, ordered_keys: &[String]) -> Vec<GroupRecord> {
        let raw = stored_groups(document, &self.config.storage_key);
        read_all(&raw, ordered_keys, &self.config.default_group_name)
    }

    async fn persist(
        &self,
        container: &str,
        mut document: Value,
        records: &[GroupRecord],
    ) -> Result<()> {
        let values = to_values(records)?;
        set_stored_groups(&mut document, &self.config.storage_key, values.clone())?;
        self.host
            .save_container(
                container,
                document,
                SaveOptions {
                    skip_broadcast: true,
                },
            )
            .await?;

        if self.host.active_container_name().as_deref() == Some(container) {
            self.host
                .update_live_groups(&self.config.storage_key, &values)?;
        }
        Ok(())
    }
}

fn stored_groups(document: &Value, storage_key: &str) -> Vec<Value> {
    document
        .get(EXTENSIONS_KEY)
        .and_then(|ext| ext.get(storage_key))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn set_stored_groups(document: &mut Value, storage_key: &str, groups: Vec<Value>) -> Result<()> {
    let root = document
        .as_object_mut()
        .ok_or_else(|| StoreError::validation("container document is not an object"))?;
    let extensions = root
        .entry(EXTENSIONS_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    if !extensions.is_object() {
        *extensions = Value::Object(Map::new());
    }
    if let Some(ext) = extensions.as_object_mut() {
        ext.insert(storage_key.to_string(), Value::Array(groups));
    }
    Ok(())
}

fn require_anchor(which: &str, raw: Option<&str>) -> Result<String> {
    match raw.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(StoreError::validation(format!(
            "{which} anchor must be a non-empty identifier"
        ))),
    }
}

fn merge_anchor(existing: &GroupAnchor, patch: &GroupPatch) -> Result<GroupAnchor> {
    if patch.start.is_none() && patch.end.is_none() {
        return Ok(existing.clone());
    }
    let start = patch
        .start
        .as_deref()
        .map(|s| require_anchor("start", Some(s)))
        .transpose()?;
    let end = patch
        .end
        .as_deref()
        .map(|s| require_anchor("end", Some(s)))
        .transpose()?;

    match (existing, start, end) {
        (_, Some(start), Some(end)) => Ok(GroupAnchor::Resolved { start, end }),
        (GroupAnchor::Resolved { end, .. }, Some(start), None) => Ok(GroupAnchor::Resolved {
            start,
            end: end.clone(),
        }),
        (GroupAnchor::Resolved { start, .. }, None, Some(end)) => Ok(GroupAnchor::Resolved {
            start: start.clone(),
            end,
        }),
        (GroupAnchor::Unresolved(_), _, _) => Err(StoreError::validation(
            "unresolved groups need both anchors to be reassigned",
        )),
        (GroupAnchor::Resolved { .. }, None, None) => Ok(existing.clone()),
    }
}
