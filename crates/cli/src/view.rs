//! Headless entry list used by `render`: wrapping collects sections instead
//! of touching a UI.

use grouping_engine::{EventSink, GroupLabel, ViewAdapter, ViewId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingSection {
    /// `None` for entries outside every group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub entries: Vec<String>,
}

pub struct ListingView {
    keys: Vec<String>,
    wrapped: Vec<GroupLabel>,
    unresolved: usize,
    sink: Option<EventSink>,
}

impl ListingView {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            wrapped: Vec::new(),
            unresolved: 0,
            sink: None,
        }
    }

    pub const fn unresolved(&self) -> usize {
        self.unresolved
    }

    /// Entries in display order, grouped runs first-class.
    pub fn sections(&self) -> Vec<ListingSection> {
        let mut labels: Vec<&GroupLabel> = self.wrapped.iter().collect();
        labels.sort_by_key(|label| label.span.start);

        let mut out = Vec::new();
        let mut loose = Vec::new();
        let mut labels = labels.into_iter().peekable();
        let mut index = 0;
        while index < self.keys.len() {
            if let Some(label) = labels.next_if(|label| label.span.start == index) {
                if !loose.is_empty() {
                    out.push(loose_section(std::mem::take(&mut loose)));
                }
                out.push(ListingSection {
                    group_id: Some(label.id.clone()),
                    name: Some(label.name.clone()),
                    entries: label.span.keys(&self.keys).to_vec(),
                });
                index = label.span.end + 1;
                continue;
            }
            loose.push(self.keys[index].clone());
            index += 1;
        }
        if !loose.is_empty() {
            out.push(loose_section(loose));
        }
        out
    }
}

fn loose_section(entries: Vec<String>) -> ListingSection {
    ListingSection {
        group_id: None,
        name: None,
        entries,
    }
}

impl ViewAdapter for ListingView {
    fn view_id(&self) -> Option<ViewId> {
        Some(ViewId(0))
    }

    fn ordered_keys(&self) -> grouping_engine::Result<Vec<String>> {
        Ok(self.keys.clone())
    }

    fn has_presentation(&self) -> bool {
        !self.wrapped.is_empty()
    }

    fn wrap_range(&mut self, _keys: &[String], label: &GroupLabel) -> grouping_engine::Result<()> {
        self.wrapped.push(label.clone());
        Ok(())
    }

    fn unwrap_all(&mut self) -> grouping_engine::Result<()> {
        self.wrapped.clear();
        Ok(())
    }

    fn observe(&mut self, sink: EventSink) -> grouping_engine::Result<()> {
        self.sink = Some(sink);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.sink = None;
    }

    fn show_unresolved_notice(&mut self, count: usize) {
        self.unresolved = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grouping_records::Span;
    use pretty_assertions::assert_eq;

    fn label(id: &str, start: usize, end: usize) -> GroupLabel {
        GroupLabel {
            id: id.to_string(),
            name: id.to_uppercase(),
            ordinal: 0,
            span: Span { start, end },
        }
    }

    #[test]
    fn sections_interleave_groups_and_loose_entries() {
        let keys: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        let mut view = ListingView::new(keys);
        view.wrap_range(&[], &label("g2", 3, 3)).unwrap();
        view.wrap_range(&[], &label("g1", 1, 2)).unwrap();

        let sections = view.sections();
        let entries: Vec<Vec<String>> = sections.iter().map(|s| s.entries.clone()).collect();
        assert_eq!(
            entries,
            vec![
                vec!["a".to_string()],
                vec!["b".to_string(), "c".to_string()],
                vec!["d".to_string()],
                vec!["e".to_string()],
            ]
        );
        assert_eq!(sections[1].name.as_deref(), Some("G1"));
        assert_eq!(sections[3].group_id, None);
    }
}
