use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Placeholder label for groups stored without a usable name.
pub const DEFAULT_GROUP_NAME: &str = "Unnamed Group";

const GENERATED_ID_PREFIX: &str = "grp_";
const DERIVED_ID_PREFIX: &str = "grp_legacy_";

/// Inclusion semantics of a prompt group span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// Both anchors and everything between them belong to the group.
    #[default]
    Inclusive,
}

impl GroupMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inclusive => "inclusive",
        }
    }

    /// Unknown tags fall back to the only supported mode.
    #[must_use]
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("inclusive") | None => Self::Inclusive,
            Some(other) => {
                log::debug!("unknown group mode {other:?}, treating as inclusive");
                Self::Inclusive
            }
        }
    }
}

/// Anchor state that could not be mapped onto the live sequence.
///
/// Everything the record carried is kept so a later read can try again once the
/// referenced entries reappear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnresolvedAnchor {
    pub legacy_start: Option<i64>,
    pub legacy_end: Option<i64>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl UnresolvedAnchor {
    #[must_use]
    pub fn legacy(start: i64, end: i64) -> Self {
        Self {
            legacy_start: Some(start),
            legacy_end: Some(end),
            ..Self::default()
        }
    }

    /// At least one piece of boundary data survives.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.legacy_start.is_some()
            || self.legacy_end.is_some()
            || self.start.is_some()
            || self.end.is_some()
    }
}

/// Group boundaries: either two stable entry keys or a flagged unresolved remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupAnchor {
    Resolved { start: String, end: String },
    Unresolved(UnresolvedAnchor),
}

impl GroupAnchor {
    #[must_use]
    pub fn resolved(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self::Resolved {
            start: start.into(),
            end: end.into(),
        }
    }

    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved(_))
    }

    /// Identifier pair, when the anchor is in resolved form.
    #[must_use]
    pub fn keys(&self) -> Option<(&str, &str)> {
        match self {
            Self::Resolved { start, end } => Some((start.as_str(), end.as_str())),
            Self::Unresolved(_) => None,
        }
    }
}

/// One prompt group, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub id: String,
    pub name: String,
    pub mode: GroupMode,
    pub anchor: GroupAnchor,
}

impl GroupRecord {
    /// Fresh resolved record with a newly generated id.
    pub fn new(name: &str, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            id: generate_group_id(),
            name: display_name(Some(name), DEFAULT_GROUP_NAME),
            mode: GroupMode::Inclusive,
            anchor: GroupAnchor::resolved(start, end),
        }
    }

    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        self.anchor.is_unresolved()
    }

    /// Persisted shape of this record.
    #[must_use]
    pub fn to_stored(&self) -> StoredGroup {
        match &self.anchor {
            GroupAnchor::Resolved { start, end } => StoredGroup {
                id: Some(self.id.clone()),
                name: Some(self.name.clone()),
                start_identifier: Some(start.clone()),
                end_identifier: Some(end.clone()),
                mode: Some(self.mode.as_str().to_string()),
                ..StoredGroup::default()
            },
            GroupAnchor::Unresolved(rest) => StoredGroup {
                id: Some(self.id.clone()),
                name: Some(self.name.clone()),
                start_identifier: rest.start.clone(),
                end_identifier: rest.end.clone(),
                mode: Some(self.mode.as_str().to_string()),
                unresolved: Some(true),
                legacy_start_index: rest.legacy_start,
                legacy_end_index: rest.legacy_end,
                ..StoredGroup::default()
            },
        }
    }
}

/// JSON shape of a prompt group as the host stores it.
///
/// Older records carry only `startIndex`/`endIndex`; those are still accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_start_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_end_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<i64>,
}

/// Trimmed name, or the placeholder when nothing usable is left.
#[must_use]
pub fn display_name(raw: Option<&str>, fallback: &str) -> String {
    match raw.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => fallback.to_string(),
    }
}

/// Random opaque id for a newly created group.
#[must_use]
pub fn generate_group_id() -> String {
    let mut bytes = [0u8; 8];
    if let Err(err) = getrandom::getrandom(&mut bytes) {
        log::warn!("random source unavailable for group id: {err}");
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        bytes = (nanos as u64).to_be_bytes();
    }
    format!("{GENERATED_ID_PREFIX}{}", hex(&bytes))
}

/// Stable id for a stored record that arrived without one.
///
/// Derived from the record's position and content so repeated reads agree.
#[must_use]
pub fn derived_group_id(position: usize, stored: &StoredGroup) -> String {
    let mut hasher = Sha256::new();
    hasher.update(position.to_be_bytes());
    for part in [
        stored.name.as_deref(),
        stored.start_identifier.as_deref(),
        stored.end_identifier.as_deref(),
    ] {
        hasher.update(part.unwrap_or_default().as_bytes());
        hasher.update([0x1f]);
    }
    for idx in [
        stored.start_index.or(stored.legacy_start_index),
        stored.end_index.or(stored.legacy_end_index),
    ] {
        hasher.update(idx.unwrap_or(-1).to_be_bytes());
    }
    let digest = hasher.finalize();
    format!("{DERIVED_ID_PREFIX}{}", hex(&digest[..8]))
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
