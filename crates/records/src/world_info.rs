//! World-info groups: named, collapsible tags over numeric entry uids.
//!
//! Groups of one book live in a map keyed by generated id; display order is kept
//! in a separate `groupOrder` list because map order does not survive every
//! host's persistence round trip.

use crate::model::{display_name, generate_group_id};
use crate::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Label shown for a group section with no visible entries.
pub const EMPTY_GROUP_LABEL: &str = "(empty)";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldInfoGroup {
    pub name: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub entries: Vec<u64>,
}

/// Groups of a single world book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookGroups {
    #[serde(default)]
    pub groups: BTreeMap<String, WorldInfoGroup>,
    #[serde(default)]
    pub group_order: Vec<String>,
}

/// One rendered block of a book's entry list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// `None` for the trailing ungrouped block.
    pub group_id: Option<String>,
    pub label: String,
    pub collapsed: bool,
    pub entries: Vec<u64>,
}

impl Section {
    #[must_use]
    pub fn is_empty_group(&self) -> bool {
        self.group_id.is_some() && self.entries.is_empty()
    }

    /// Text shown in place of the entry list.
    #[must_use]
    pub fn placeholder(&self) -> Option<&'static str> {
        self.is_empty_group().then_some(EMPTY_GROUP_LABEL)
    }
}

impl BookGroups {
    /// Parse a stored book value leniently and normalize it.
    #[must_use]
    pub fn from_value(value: &Value, default_name: &str) -> Self {
        let mut book = Self::default();
        let Some(obj) = value.as_object() else {
            return book;
        };
        if let Some(groups) = obj.get("groups").and_then(Value::as_object) {
            for (id, raw) in groups {
                let Some(group) = raw.as_object() else {
                    continue;
                };
                let entries = group
                    .get("entries")
                    .and_then(Value::as_array)
                    .map(|list| list.iter().filter_map(Value::as_u64).collect())
                    .unwrap_or_default();
                book.groups.insert(
                    id.clone(),
                    WorldInfoGroup {
                        name: display_name(
                            group.get("name").and_then(Value::as_str),
                            default_name,
                        ),
                        collapsed: group
                            .get("collapsed")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                        entries,
                    },
                );
            }
        }
        if let Some(order) = obj.get("groupOrder").and_then(Value::as_array) {
            book.group_order = order
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
        book.normalize();
        book
    }

    /// Re-establish the order and membership invariants.
    ///
    /// `group_order` ends up holding exactly the existing group ids without
    /// duplicates; ids missing from it are appended. An entry uid is claimed by at
    /// most one group, the first in display order.
    pub fn normalize(&mut self) {
        let mut seen = HashSet::new();
        let groups = &self.groups;
        self.group_order
            .retain(|id| groups.contains_key(id) && seen.insert(id.clone()));
        for id in self.groups.keys() {
            if !seen.contains(id) {
                self.group_order.push(id.clone());
                seen.insert(id.clone());
            }
        }

        let mut claimed = HashSet::new();
        for id in &self.group_order {
            if let Some(group) = self.groups.get_mut(id) {
                group.entries.retain(|uid| claimed.insert(*uid));
            }
        }
    }

    /// Groups in display order.
    pub fn ordered(&self) -> impl Iterator<Item = (&str, &WorldInfoGroup)> {
        self.group_order
            .iter()
            .filter_map(|id| self.groups.get(id).map(|g| (id.as_str(), g)))
    }

    #[must_use]
    pub fn group_of(&self, uid: u64) -> Option<&str> {
        self.ordered()
            .find(|(_, group)| group.entries.contains(&uid))
            .map(|(id, _)| id)
    }

    pub fn create_group(&mut self, name: &str, default_name: &str) -> String {
        let id = generate_group_id();
        self.groups.insert(
            id.clone(),
            WorldInfoGroup {
                name: display_name(Some(name), default_name),
                collapsed: false,
                entries: Vec::new(),
            },
        );
        self.group_order.push(id.clone());
        id
    }

    pub fn rename_group(&mut self, id: &str, name: &str, default_name: &str) -> Result<()> {
        let group = self.group_mut(id)?;
        group.name = display_name(Some(name), default_name);
        Ok(())
    }

    /// Delete a group; its entries become ungrouped.
    pub fn delete_group(&mut self, id: &str) -> Result<WorldInfoGroup> {
        let removed = self
            .groups
            .remove(id)
            .ok_or_else(|| StoreError::GroupNotFound(id.to_string()))?;
        self.group_order.retain(|g| g != id);
        Ok(removed)
    }

    pub fn set_collapsed(&mut self, id: &str, collapsed: bool) -> Result<()> {
        self.group_mut(id)?.collapsed = collapsed;
        Ok(())
    }

    /// Flip a group's collapsed flag; returns the new value.
    pub fn toggle_collapsed(&mut self, id: &str) -> Result<bool> {
        let group = self.group_mut(id)?;
        group.collapsed = !group.collapsed;
        Ok(group.collapsed)
    }

    pub fn set_all_collapsed(&mut self, collapsed: bool) {
        for group in self.groups.values_mut() {
            group.collapsed = collapsed;
        }
    }

    /// Tag `uid` with group `id`, moving it out of any other group of this book.
    pub fn add_entry(&mut self, id: &str, uid: u64) -> Result<()> {
        if !self.groups.contains_key(id) {
            return Err(StoreError::GroupNotFound(id.to_string()));
        }
        self.remove_entry(uid);
        self.group_mut(id)?.entries.push(uid);
        Ok(())
    }

    /// Untag `uid`; returns the id of the group it was removed from.
    pub fn remove_entry(&mut self, uid: u64) -> Option<String> {
        let mut removed_from = None;
        for (id, group) in &mut self.groups {
            let before = group.entries.len();
            group.entries.retain(|e| *e != uid);
            if group.entries.len() != before && removed_from.is_none() {
                removed_from = Some(id.clone());
            }
        }
        removed_from
    }

    /// Move the group at display position `from` to position `to`.
    pub fn move_group(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.group_order.len();
        if from >= len {
            return Err(StoreError::index(from, len));
        }
        if to >= len {
            return Err(StoreError::index(to, len));
        }
        let id = self.group_order.remove(from);
        self.group_order.insert(to, id);
        Ok(())
    }

    /// Lay out `entries` (uids in host display order) as group sections followed
    /// by the ungrouped remainder. Uids a group references but the book no longer
    /// shows are kept in storage and left out of the layout.
    #[must_use]
    pub fn layout(&self, entries: &[u64]) -> Vec<Section> {
        let present: HashSet<u64> = entries.iter().copied().collect();
        let mut grouped = HashSet::new();
        let mut sections: Vec<Section> = self
            .ordered()
            .map(|(id, group)| {
                let members: Vec<u64> = group
                    .entries
                    .iter()
                    .copied()
                    .filter(|uid| present.contains(uid))
                    .collect();
                grouped.extend(members.iter().copied());
                Section {
                    group_id: Some(id.to_string()),
                    label: group.name.clone(),
                    collapsed: group.collapsed,
                    entries: members,
                }
            })
            .collect();

        let rest: Vec<u64> = entries
            .iter()
            .copied()
            .filter(|uid| !grouped.contains(uid))
            .collect();
        if !rest.is_empty() {
            sections.push(Section {
                group_id: None,
                label: String::new(),
                collapsed: false,
                entries: rest,
            });
        }
        sections
    }

    fn group_mut(&mut self, id: &str) -> Result<&mut WorldInfoGroup> {
        self.groups
            .get_mut(id)
            .ok_or_else(|| StoreError::GroupNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_GROUP_NAME;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn book(value: Value) -> BookGroups {
        BookGroups::from_value(&value, DEFAULT_GROUP_NAME)
    }

    #[test]
    fn order_is_recomputed_on_read() {
        let b = book(json!({
            "groups": {
                "g1": {"name": "One", "entries": [1]},
                "g2": {"name": "Two", "entries": []},
                "g3": {"name": "Three"}
            },
            "groupOrder": ["g2", "stale", "g2", "g1"]
        }));
        assert_eq!(b.group_order, vec!["g2", "g1", "g3"]);
    }

    #[test]
    fn an_entry_belongs_to_one_group() {
        let b = book(json!({
            "groups": {
                "g1": {"name": "One", "entries": [1, 2, 2]},
                "g2": {"name": "Two", "entries": [2, 3]}
            },
            "groupOrder": ["g2", "g1"]
        }));
        assert_eq!(b.groups["g2"].entries, vec![2, 3]);
        assert_eq!(b.groups["g1"].entries, vec![1]);
    }

    #[test]
    fn add_entry_moves_between_groups() {
        let mut b = BookGroups::default();
        let a = b.create_group("A", DEFAULT_GROUP_NAME);
        let c = b.create_group("C", DEFAULT_GROUP_NAME);
        b.add_entry(&a, 7).unwrap();
        b.add_entry(&c, 7).unwrap();
        assert!(b.groups[&a].entries.is_empty());
        assert_eq!(b.group_of(7), Some(c.as_str()));
        assert_eq!(b.remove_entry(7), Some(c.clone()));
        assert_eq!(b.group_of(7), None);
    }

    #[test]
    fn unknown_group_is_an_error() {
        let mut b = BookGroups::default();
        assert!(matches!(
            b.add_entry("missing", 1),
            Err(StoreError::GroupNotFound(_))
        ));
        assert!(b.delete_group("missing").is_err());
    }

    #[test]
    fn move_group_reorders_and_checks_bounds() {
        let mut b = BookGroups::default();
        let one = b.create_group("1", DEFAULT_GROUP_NAME);
        let two = b.create_group("2", DEFAULT_GROUP_NAME);
        let three = b.create_group("3", DEFAULT_GROUP_NAME);
        b.move_group(2, 0).unwrap();
        assert_eq!(b.group_order, vec![three, one, two]);
        assert!(matches!(
            b.move_group(0, 3),
            Err(StoreError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn layout_renders_empty_groups_and_ungrouped_tail() {
        let b = book(json!({
            "groups": {
                "g1": {"name": "Lore", "entries": [3, 1], "collapsed": true},
                "g2": {"name": "Empty", "entries": [99]}
            },
            "groupOrder": ["g1", "g2"]
        }));
        let sections = b.layout(&[1, 2, 3, 4]);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].entries, vec![3, 1]);
        assert!(sections[0].collapsed);
        assert_eq!(sections[1].placeholder(), Some(EMPTY_GROUP_LABEL));
        assert_eq!(sections[2].group_id, None);
        assert_eq!(sections[2].entries, vec![2, 4]);
        // Uid 99 is not shown but stays stored.
        assert_eq!(b.groups["g2"].entries, vec![99]);
    }

    #[test]
    fn collapse_controls() {
        let mut b = BookGroups::default();
        let g = b.create_group("", DEFAULT_GROUP_NAME);
        assert_eq!(b.groups[&g].name, DEFAULT_GROUP_NAME);
        assert!(b.toggle_collapsed(&g).unwrap());
        b.set_all_collapsed(false);
        assert!(!b.groups[&g].collapsed);
    }
}
