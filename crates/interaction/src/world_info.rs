//! World-info toolbar, entry context menu and group drag reorder.

use crate::config::GestureConfig;
use crate::long_press::{LongPress, Point};
use crate::Result;
use grouping_records::{HostDocuments, Section, WorldInfoStore};
use log::debug;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolbarAction {
    CreateGroup { name: String },
    ExpandAll,
    CollapseAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryMenuAction {
    AddToGroup { group_id: String },
    RemoveFromGroup,
    CreateAndAdd { name: String },
}

/// Choices offered by the context menu of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMenu {
    pub uid: u64,
    /// Group the entry is tagged with, if any.
    pub current: Option<String>,
    /// `(id, name)` of groups it can be moved to, in display order.
    pub targets: Vec<(String, String)>,
}

impl EntryMenu {
    #[must_use]
    pub fn actions(&self) -> Vec<EntryMenuAction> {
        let mut out: Vec<EntryMenuAction> = self
            .targets
            .iter()
            .map(|(id, _)| EntryMenuAction::AddToGroup {
                group_id: id.clone(),
            })
            .collect();
        if self.current.is_some() {
            out.push(EntryMenuAction::RemoveFromGroup);
        }
        out.push(EntryMenuAction::CreateAndAdd {
            name: String::new(),
        });
        out
    }
}

/// Drag of a group header between display positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupDrag {
    from: Option<usize>,
    over: Option<usize>,
}

impl GroupDrag {
    pub fn start(&mut self, from: usize) {
        self.from = Some(from);
        self.over = Some(from);
    }

    pub fn hover(&mut self, position: usize) {
        if self.from.is_some() {
            self.over = Some(position);
        }
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    /// `(from, to)` of a drop that changes the order.
    pub fn finish(&mut self) -> Option<(usize, usize)> {
        let (from, to) = (self.from?, self.over?);
        self.cancel();
        (from != to).then_some((from, to))
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.from.is_some()
    }
}

/// World-info grouping interactions for one host.
pub struct WorldInfoSurface<H: ?Sized> {
    store: Arc<WorldInfoStore<H>>,
    long_press: LongPress,
    drag: GroupDrag,
}

impl<H: HostDocuments + ?Sized> WorldInfoSurface<H> {
    pub fn new(store: Arc<WorldInfoStore<H>>, config: &GestureConfig) -> Self {
        Self {
            store,
            long_press: LongPress::new(config),
            drag: GroupDrag::default(),
        }
    }

    /// Sections to render for `entries` (uids in host order).
    pub fn sections(&self, book: &str, entries: &[u64]) -> Result<Vec<Section>> {
        Ok(self.store.book(book)?.layout(entries))
    }

    /// Returns the id of a newly created group.
    pub async fn toolbar(&self, book: &str, action: ToolbarAction) -> Result<Option<String>> {
        match action {
            ToolbarAction::CreateGroup { name } => {
                Ok(Some(self.store.create_group(book, &name).await?))
            }
            ToolbarAction::ExpandAll => {
                self.store.set_all_collapsed(book, false).await?;
                Ok(None)
            }
            ToolbarAction::CollapseAll => {
                self.store.set_all_collapsed(book, true).await?;
                Ok(None)
            }
        }
    }

    /// Header click: flip one group; returns the new collapsed flag.
    pub async fn toggle_group(&self, book: &str, group_id: &str) -> Result<bool> {
        Ok(self.store.toggle_collapsed(book, group_id).await?)
    }

    pub async fn rename_group(&self, book: &str, group_id: &str, name: &str) -> Result<()> {
        Ok(self.store.rename_group(book, group_id, name).await?)
    }

    pub async fn delete_group(&self, book: &str, group_id: &str) -> Result<()> {
        Ok(self.store.delete_group(book, group_id).await?)
    }

    pub fn press(&mut self, uid: u64, at: Point, now: Instant) {
        self.long_press.press(uid, at, now);
    }

    pub fn pointer_moved(&mut self, to: Point) {
        self.long_press.moved(to);
    }

    pub fn release(&mut self) {
        self.long_press.release();
    }

    #[must_use]
    pub fn long_press_deadline(&self) -> Option<Instant> {
        self.long_press.deadline()
    }

    /// Context menu for a completed long press, if one completed by `now`.
    pub fn poll_long_press(&mut self, book: &str, now: Instant) -> Result<Option<EntryMenu>> {
        let Some(uid) = self.long_press.poll(now) else {
            return Ok(None);
        };
        self.entry_menu(book, uid).map(Some)
    }

    pub fn entry_menu(&self, book: &str, uid: u64) -> Result<EntryMenu> {
        let groups = self.store.book(book)?;
        let current = groups.group_of(uid).map(str::to_string);
        let targets = groups
            .ordered()
            .filter(|(id, _)| current.as_deref() != Some(*id))
            .map(|(id, group)| (id.to_string(), group.name.clone()))
            .collect();
        Ok(EntryMenu {
            uid,
            current,
            targets,
        })
    }

    /// Returns the group the entry ends up in.
    pub async fn apply_entry_action(
        &self,
        book: &str,
        uid: u64,
        action: EntryMenuAction,
    ) -> Result<Option<String>> {
        match action {
            EntryMenuAction::AddToGroup { group_id } => {
                self.store.add_entry(book, &group_id, uid).await?;
                Ok(Some(group_id))
            }
            EntryMenuAction::RemoveFromGroup => {
                let from = self.store.remove_entry(book, uid).await?;
                debug!("entry {uid} removed from {from:?} in {book}");
                Ok(None)
            }
            EntryMenuAction::CreateAndAdd { name } => {
                Ok(Some(self.store.create_and_add(book, &name, uid).await?))
            }
        }
    }

    pub fn begin_drag(&mut self, from: usize) {
        self.drag.start(from);
    }

    pub fn drag_over(&mut self, position: usize) {
        self.drag.hover(position);
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    /// Persist the dragged order. `false` when the drop changed nothing.
    pub async fn drop_group(&mut self, book: &str) -> Result<bool> {
        let Some((from, to)) = self.drag.finish() else {
            return Ok(false);
        };
        self.store.move_group(book, from, to).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_without_movement_is_noop() {
        let mut drag = GroupDrag::default();
        drag.start(2);
        assert_eq!(drag.finish(), None);
        assert!(!drag.is_active());

        drag.hover(1);
        assert_eq!(drag.finish(), None);

        drag.start(0);
        drag.hover(2);
        assert_eq!(drag.finish(), Some((0, 2)));
    }

    #[test]
    fn menu_offers_remove_only_when_grouped() {
        let menu = EntryMenu {
            uid: 4,
            current: None,
            targets: vec![("g1".to_string(), "Lore".to_string())],
        };
        assert_eq!(
            menu.actions(),
            vec![
                EntryMenuAction::AddToGroup {
                    group_id: "g1".to_string()
                },
                EntryMenuAction::CreateAndAdd {
                    name: String::new()
                },
            ]
        );
    }
}
