//! Normalization of stored prompt groups against the current entry order.
//!
//! Stored data comes in two generations: anchor records (`startIdentifier` /
//! `endIdentifier`) and positional records (`startIndex` / `endIndex`). Both
//! normalize to [`GroupRecord`]; positional records are upgraded whenever the
//! current order is long enough to translate them.

use crate::model::{
    derived_group_id, display_name, GroupAnchor, GroupMode, GroupRecord, StoredGroup,
    UnresolvedAnchor,
};
use serde_json::Value;

/// Normalize every stored entry for in-memory use.
///
/// Entries that are neither anchor-based nor positional are dropped.
#[must_use]
pub fn read_all(raw: &[Value], ordered_keys: &[String], default_name: &str) -> Vec<GroupRecord> {
    raw.iter()
        .enumerate()
        .filter_map(|(position, value)| {
            let record = normalize_value(position, value, ordered_keys, default_name);
            if record.is_none() {
                log::debug!("dropping malformed stored group at position {position}");
            }
            record
        })
        .collect()
}

/// Normalize every stored entry into the shape that gets persisted.
#[must_use]
pub fn write_all(raw: &[Value], ordered_keys: &[String], default_name: &str) -> Vec<StoredGroup> {
    read_all(raw, ordered_keys, default_name)
        .iter()
        .map(GroupRecord::to_stored)
        .collect()
}

/// Serialize normalized records back into raw JSON values.
pub fn to_values(records: &[GroupRecord]) -> serde_json::Result<Vec<Value>> {
    records
        .iter()
        .map(|record| serde_json::to_value(record.to_stored()))
        .collect()
}

fn normalize_value(
    position: usize,
    value: &Value,
    ordered_keys: &[String],
    default_name: &str,
) -> Option<GroupRecord> {
    let stored = parse_stored(value)?;
    let anchor = classify(&stored, ordered_keys)?;
    let id = match stored.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => derived_group_id(position, &stored),
    };
    Some(GroupRecord {
        id,
        name: display_name(stored.name.as_deref(), default_name),
        mode: GroupMode::parse_lenient(stored.mode.as_deref()),
        anchor,
    })
}

fn classify(stored: &StoredGroup, ordered_keys: &[String]) -> Option<GroupAnchor> {
    let flagged = stored.unresolved == Some(true);

    if let (Some(start), Some(end)) = (
        non_empty(stored.start_identifier.as_deref()),
        non_empty(stored.end_identifier.as_deref()),
    ) {
        if !flagged {
            return Some(GroupAnchor::resolved(start, end));
        }
        return Some(GroupAnchor::Unresolved(UnresolvedAnchor {
            legacy_start: stored.legacy_start_index,
            legacy_end: stored.legacy_end_index,
            start: Some(start.to_string()),
            end: Some(end.to_string()),
        }));
    }

    let start_index = stored.start_index.or(stored.legacy_start_index);
    let end_index = stored.end_index.or(stored.legacy_end_index);
    if let (Some(start_index), Some(end_index)) = (start_index, end_index) {
        return Some(match (key_at(ordered_keys, start_index), key_at(ordered_keys, end_index)) {
            (Some(start), Some(end)) => GroupAnchor::resolved(start, end),
            _ => GroupAnchor::Unresolved(UnresolvedAnchor {
                legacy_start: Some(start_index),
                legacy_end: Some(end_index),
                start: stored.start_identifier.clone(),
                end: stored.end_identifier.clone(),
            }),
        });
    }

    if flagged {
        let rest = UnresolvedAnchor {
            legacy_start: start_index,
            legacy_end: end_index,
            start: stored.start_identifier.clone(),
            end: stored.end_identifier.clone(),
        };
        if rest.has_data() {
            return Some(GroupAnchor::Unresolved(rest));
        }
    }

    None
}

fn key_at(ordered_keys: &[String], index: i64) -> Option<&str> {
    let index = usize::try_from(index).ok()?;
    ordered_keys.get(index).map(String::as_str)
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.trim().is_empty())
}

/// Field-by-field extraction so one badly typed field does not reject the record.
fn parse_stored(value: &Value) -> Option<StoredGroup> {
    let obj = value.as_object()?;
    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
    let index = |key: &str| obj.get(key).and_then(as_index);
    Some(StoredGroup {
        id: text("id"),
        name: text("name"),
        start_identifier: text("startIdentifier"),
        end_identifier: text("endIdentifier"),
        mode: text("mode"),
        unresolved: obj.get("unresolved").and_then(Value::as_bool),
        legacy_start_index: index("legacyStartIndex"),
        legacy_end_index: index("legacyEndIndex"),
        start_index: index("startIndex"),
        end_index: index("endIndex"),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn as_index(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}
