//! Anchor resolution against a live ordered key sequence.

use crate::model::{GroupAnchor, GroupRecord};
use serde::Serialize;

/// Inclusive index range of a resolved group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[allow(clippy::len_without_is_empty)]
impl Span {
    /// Span between two positions in either order.
    #[must_use]
    pub fn between(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    #[must_use]
    pub const fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Keys covered by this span; empty when the span no longer fits `ordered_keys`.
    #[must_use]
    pub fn keys<'a>(&self, ordered_keys: &'a [String]) -> &'a [String] {
        ordered_keys.get(self.start..=self.end).unwrap_or(&[])
    }
}

/// Position of `key` in the ordered sequence.
#[must_use]
pub fn position_of(ordered_keys: &[String], key: &str) -> Option<usize> {
    ordered_keys.iter().position(|k| k == key)
}

/// Map a record's anchors to a span, or `None` when either anchor is absent.
///
/// Flagged records never resolve; callers count them separately.
#[must_use]
pub fn resolve(record: &GroupRecord, ordered_keys: &[String]) -> Option<Span> {
    let (start, end) = record.anchor.keys()?;
    let start = position_of(ordered_keys, start)?;
    let end = position_of(ordered_keys, end)?;
    Some(Span::between(start, end))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "key", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Stored with the unresolved flag; resolution is not attempted.
    Flagged,
    /// Anchor key not present in the current sequence.
    MissingAnchor(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupStatus {
    Resolved { span: Span },
    Unresolved { cause: UnresolvedReason },
}

/// A record together with the outcome of resolving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroup {
    pub record: GroupRecord,
    pub status: GroupStatus,
}

impl ResolvedGroup {
    #[must_use]
    pub const fn span(&self) -> Option<Span> {
        match self.status {
            GroupStatus::Resolved { span } => Some(span),
            GroupStatus::Unresolved { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self.status, GroupStatus::Unresolved { .. })
    }
}

/// Resolution of every group in a container against one key sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub groups: Vec<ResolvedGroup>,
}

impl Resolution {
    /// Groups with a span, in storage order.
    pub fn resolved(&self) -> impl Iterator<Item = (&GroupRecord, Span)> {
        self.groups
            .iter()
            .filter_map(|g| g.span().map(|span| (&g.record, span)))
    }

    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved().count()
    }

    /// Groups skipped for the aggregate "could not be resolved" warning.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.groups.iter().filter(|g| g.is_unresolved()).count()
    }

    /// Groups that were eligible for resolution (not flagged in storage).
    #[must_use]
    pub fn eligible_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| !g.record.is_unresolved())
            .count()
    }

    /// First resolved group whose span covers `index`.
    #[must_use]
    pub fn owner_of(&self, index: usize) -> Option<&GroupRecord> {
        self.resolved()
            .find(|(_, span)| span.contains(index))
            .map(|(record, _)| record)
    }

    /// First position inside `span` already claimed by a resolved group.
    #[must_use]
    pub fn first_overlap(&self, span: Span) -> Option<(usize, &GroupRecord)> {
        (span.start..=span.end).find_map(|idx| self.owner_of(idx).map(|rec| (idx, rec)))
    }
}

/// Resolve every record against `ordered_keys`.
#[must_use]
pub fn resolve_all(records: &[GroupRecord], ordered_keys: &[String]) -> Resolution {
    let groups = records
        .iter()
        .map(|record| {
            let status = match &record.anchor {
                GroupAnchor::Unresolved(_) => GroupStatus::Unresolved {
                    cause: UnresolvedReason::Flagged,
                },
                GroupAnchor::Resolved { start, end } => match resolve(record, ordered_keys) {
                    Some(span) => GroupStatus::Resolved { span },
                    None => {
                        let missing = if position_of(ordered_keys, start).is_none() {
                            start
                        } else {
                            end
                        };
                        GroupStatus::Unresolved {
                            cause: UnresolvedReason::MissingAnchor(missing.clone()),
                        }
                    }
                },
            };
            ResolvedGroup {
                record: record.clone(),
                status,
            }
        })
        .collect();
    Resolution { groups }
}
