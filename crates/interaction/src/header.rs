//! Intents raised from a rendered group's header.

use crate::marks::{check_new_span, refresh};
use crate::toggle::{group_state, toggle_all, EntryToggles, ToggleReport, ToggleState};
use crate::Result;
use grouping_engine::EngineHandle;
use grouping_records::{
    resolve, resolve_all, GroupPatch, GroupRecord, GroupStore, HostDocuments, StoreError,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderIntent {
    Rename { name: String },
    Delete,
    /// Move both anchors.
    Reassign { start: String, end: String },
    ToggleAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderOutcome {
    Renamed(GroupRecord),
    Deleted(GroupRecord),
    Reassigned(GroupRecord),
    Toggled(ToggleReport),
}

/// Applies header intents to the group at an index of the normalized list.
pub struct GroupHeaders<H: ?Sized> {
    store: Arc<GroupStore<H>>,
    toggles: Arc<dyn EntryToggles>,
    engine: Option<EngineHandle>,
}

impl<H: HostDocuments + ?Sized> GroupHeaders<H> {
    pub fn new(store: Arc<GroupStore<H>>, toggles: Arc<dyn EntryToggles>) -> Self {
        Self {
            store,
            toggles,
            engine: None,
        }
    }

    #[must_use]
    pub fn with_engine(mut self, engine: EngineHandle) -> Self {
        self.engine = Some(engine);
        self
    }

    pub async fn apply(
        &self,
        container: &str,
        index: usize,
        intent: HeaderIntent,
        ordered_keys: &[String],
    ) -> Result<HeaderOutcome> {
        let outcome = match intent {
            HeaderIntent::Rename { name } => HeaderOutcome::Renamed(
                self.store
                    .update(container, index, GroupPatch::rename(name), ordered_keys)
                    .await?,
            ),
            HeaderIntent::Delete => {
                HeaderOutcome::Deleted(self.store.remove(container, index, ordered_keys).await?)
            }
            HeaderIntent::Reassign { start, end } => {
                let mut others = self.store.read(container, ordered_keys)?;
                if index >= others.len() {
                    return Err(StoreError::index(index, others.len()).into());
                }
                others.remove(index);
                let resolution = resolve_all(&others, ordered_keys);
                check_new_span(&resolution, ordered_keys, &start, &end)?;
                HeaderOutcome::Reassigned(
                    self.store
                        .update(
                            container,
                            index,
                            GroupPatch::anchors(start, end),
                            ordered_keys,
                        )
                        .await?,
                )
            }
            HeaderIntent::ToggleAll => {
                let members = self.members(container, index, ordered_keys)?;
                return Ok(HeaderOutcome::Toggled(
                    toggle_all(self.toggles.as_ref(), &members).await?,
                ));
            }
        };
        refresh(self.engine.as_ref()).await;
        Ok(outcome)
    }

    /// Toggle-all state shown on the header of the group at `index`.
    pub fn toggle_state(
        &self,
        container: &str,
        index: usize,
        ordered_keys: &[String],
    ) -> Result<ToggleState> {
        let members = self.members(container, index, ordered_keys)?;
        Ok(group_state(self.toggles.as_ref(), &members))
    }

    /// Keys covered by the group at `index`; empty while it is unresolved.
    pub fn members(
        &self,
        container: &str,
        index: usize,
        ordered_keys: &[String],
    ) -> Result<Vec<String>> {
        let records = self.store.read(container, ordered_keys)?;
        let record = records
            .get(index)
            .ok_or_else(|| StoreError::index(index, records.len()))?;
        Ok(resolve(record, ordered_keys)
            .map(|span| span.keys(ordered_keys).to_vec())
            .unwrap_or_default())
    }
}
