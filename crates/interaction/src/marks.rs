//! Two-anchor marking session and group creation.

use crate::notice::{Notice, Notifier};
use crate::{InteractionError, Result};
use grouping_engine::EngineHandle;
use grouping_records::{
    position_of, resolve_all, GroupRecord, GroupStore, HostDocuments, Resolution, Span,
};
use log::{info, warn};
use std::sync::Arc;

/// Entries of the group-creation menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    MarkStart,
    MarkEnd,
    ClearMarks,
}

/// Where the marking session stands after a menu action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkState {
    Empty,
    /// One mark set.
    Partial,
    /// Both marks set; ask for a name and call [`GroupComposer::commit`].
    ReadyToName,
}

/// Pending start/end marks. One buffer per surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkBuffer {
    start: Option<String>,
    end: Option<String>,
}

impl MarkBuffer {
    #[must_use]
    pub fn start(&self) -> Option<&str> {
        self.start.as_deref()
    }

    #[must_use]
    pub fn end(&self) -> Option<&str> {
        self.end.as_deref()
    }

    #[must_use]
    pub fn pair(&self) -> Option<(&str, &str)> {
        Some((self.start.as_deref()?, self.end.as_deref()?))
    }

    #[must_use]
    pub fn state(&self) -> MarkState {
        match (&self.start, &self.end) {
            (Some(_), Some(_)) => MarkState::ReadyToName,
            (None, None) => MarkState::Empty,
            _ => MarkState::Partial,
        }
    }

    pub fn clear(&mut self) {
        self.start = None;
        self.end = None;
    }
}

/// Check that a new group between `start` and `end` claims no grouped entry.
///
/// The check runs over the resolved span, so entries between the anchors count
/// as well as the anchors themselves.
pub fn check_new_span(
    resolution: &Resolution,
    ordered_keys: &[String],
    start: &str,
    end: &str,
) -> Result<Span> {
    let (Some(a), Some(b)) = (
        position_of(ordered_keys, start),
        position_of(ordered_keys, end),
    ) else {
        return Err(InteractionError::Unresolvable);
    };
    let span = Span::between(a, b);
    if let Some((idx, owner)) = resolution.first_overlap(span) {
        return Err(InteractionError::Overlap {
            key: ordered_keys.get(idx).cloned().unwrap_or_default(),
            group: owner.name.clone(),
        });
    }
    Ok(span)
}

/// Drives the mark-start / mark-end / name flow against the group store.
pub struct GroupComposer<H: ?Sized> {
    store: Arc<GroupStore<H>>,
    notifier: Arc<dyn Notifier>,
    engine: Option<EngineHandle>,
    marks: MarkBuffer,
}

impl<H: HostDocuments + ?Sized> GroupComposer<H> {
    pub fn new(store: Arc<GroupStore<H>>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            engine: None,
            marks: MarkBuffer::default(),
        }
    }

    /// Re-sync this engine after every successful edit.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineHandle) -> Self {
        self.engine = Some(engine);
        self
    }

    #[must_use]
    pub const fn marks(&self) -> &MarkBuffer {
        &self.marks
    }

    /// Apply a menu action to the entry `key`.
    pub fn choose(
        &mut self,
        action: MenuAction,
        key: &str,
        container: &str,
        ordered_keys: &[String],
    ) -> Result<MarkState> {
        if action == MenuAction::ClearMarks {
            self.marks.clear();
            return Ok(MarkState::Empty);
        }

        let records = self.store.read(container, ordered_keys)?;
        let resolution = resolve_all(&records, ordered_keys);
        let owner = position_of(ordered_keys, key).and_then(|idx| resolution.owner_of(idx));
        if let Some(owner) = owner {
            self.notifier.notify(Notice::warning(format!(
                "This entry already belongs to group \"{}\"",
                owner.name
            )));
            return Err(InteractionError::AlreadyGrouped(key.to_string()));
        }

        match action {
            MenuAction::MarkStart => self.marks.start = Some(key.to_string()),
            MenuAction::MarkEnd => self.marks.end = Some(key.to_string()),
            MenuAction::ClearMarks => {}
        }
        Ok(self.marks.state())
    }

    /// Create the group from both marks. Marks are discarded whatever the outcome.
    pub async fn commit(
        &mut self,
        container: &str,
        name: &str,
        ordered_keys: &[String],
    ) -> Result<GroupRecord> {
        let Some((start, end)) = self
            .marks
            .pair()
            .map(|(s, e)| (s.to_string(), e.to_string()))
        else {
            self.notifier
                .notify(Notice::error("Mark both a start and an end entry first"));
            return Err(InteractionError::MarksIncomplete);
        };
        self.marks.clear();

        let result = self
            .create(container, &start, &end, name, ordered_keys)
            .await;
        if let Err(err) = &result {
            let message = match err {
                InteractionError::Overlap { group, .. } => {
                    format!("The selection overlaps group \"{group}\"")
                }
                InteractionError::Unresolvable => {
                    "The marked entries are no longer in the list".to_string()
                }
                other => format!("Could not create group: {other}"),
            };
            self.notifier.notify(Notice::error(message));
        }
        result
    }

    /// Validate and store a new group between two anchors.
    pub async fn create(
        &self,
        container: &str,
        start: &str,
        end: &str,
        name: &str,
        ordered_keys: &[String],
    ) -> Result<GroupRecord> {
        let records = self.store.read(container, ordered_keys)?;
        let resolution = resolve_all(&records, ordered_keys);
        let span = check_new_span(&resolution, ordered_keys, start, end)?;

        let record = self
            .store
            .add(container, start, end, name, ordered_keys)
            .await?;
        info!(
            "created group {:?} over {} entries in {container}",
            record.name,
            span.len()
        );
        refresh(self.engine.as_ref()).await;
        Ok(record)
    }
}

pub(crate) async fn refresh(engine: Option<&EngineHandle>) {
    if let Some(engine) = engine {
        if let Err(err) = engine.refresh().await {
            warn!("failed to schedule group refresh: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::{NoticeLevel, NoticeLog};
    use grouping_records::{MemoryHost, StoreConfig};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn composer(groups: serde_json::Value) -> (GroupComposer<MemoryHost>, Arc<NoticeLog>) {
        let host = MemoryHost::new()
            .with_container("p", json!({ "extensions": { "prompt_groups": groups } }));
        let store = Arc::new(GroupStore::new(Arc::new(host), StoreConfig::default()));
        let log = Arc::new(NoticeLog::new());
        (GroupComposer::new(store, log.clone()), log)
    }

    #[test]
    fn marking_progresses_to_ready() {
        let (mut c, _) = composer(json!([]));
        let ordered = keys(&["a", "b"]);
        assert_eq!(
            c.choose(MenuAction::MarkEnd, "b", "p", &ordered).unwrap(),
            MarkState::Partial
        );
        assert_eq!(
            c.choose(MenuAction::MarkStart, "a", "p", &ordered).unwrap(),
            MarkState::ReadyToName
        );
        assert_eq!(c.marks().pair(), Some(("a", "b")));
        assert_eq!(
            c.choose(MenuAction::ClearMarks, "a", "p", &ordered).unwrap(),
            MarkState::Empty
        );
    }

    #[test]
    fn grouped_entry_cannot_be_marked() {
        let (mut c, log) = composer(json!([
            { "id": "g", "name": "Core", "startIdentifier": "a", "endIdentifier": "c" }
        ]));
        let ordered = keys(&["a", "b", "c", "d"]);
        let err = c
            .choose(MenuAction::MarkStart, "b", "p", &ordered)
            .unwrap_err();
        assert!(matches!(err, InteractionError::AlreadyGrouped(ref k) if k == "b"));
        assert_eq!(c.marks().state(), MarkState::Empty);
        assert_eq!(log.notices()[0].level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn commit_without_marks_fails() {
        let (mut c, log) = composer(json!([]));
        let err = c.commit("p", "x", &keys(&["a"])).await.unwrap_err();
        assert!(matches!(err, InteractionError::MarksIncomplete));
        assert_eq!(log.notices().len(), 1);
    }

    #[tokio::test]
    async fn commit_creates_group_and_clears_marks() {
        let (mut c, log) = composer(json!([]));
        let ordered = keys(&["a", "b", "c"]);
        c.choose(MenuAction::MarkStart, "c", "p", &ordered).unwrap();
        c.choose(MenuAction::MarkEnd, "b", "p", &ordered).unwrap();
        let record = c.commit("p", "Tail", &ordered).await.unwrap();
        assert_eq!(record.name, "Tail");
        assert_eq!(record.anchor.keys(), Some(("c", "b")));
        assert_eq!(c.marks().state(), MarkState::Empty);
        assert!(log.notices().is_empty());
    }

    #[tokio::test]
    async fn vanished_anchor_discards_marks() {
        let (mut c, log) = composer(json!([]));
        c.choose(MenuAction::MarkStart, "a", "p", &keys(&["a", "b"]))
            .unwrap();
        c.choose(MenuAction::MarkEnd, "b", "p", &keys(&["a", "b"]))
            .unwrap();
        let err = c.commit("p", "G", &keys(&["b"])).await.unwrap_err();
        assert!(matches!(err, InteractionError::Unresolvable));
        assert_eq!(c.marks().state(), MarkState::Empty);
        assert_eq!(log.notices()[0].level, NoticeLevel::Error);
    }
}
