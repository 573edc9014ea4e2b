use grouping_records::{GroupAnchor, GroupRecord};
use sha2::{Digest, Sha256};

// Control characters never appear in entry identifiers or group names.
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';
const SECTION_SEP: char = '\u{1d}';

/// Deterministic encoding of everything a rebuild depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    #[must_use]
    pub fn compute(container: &str, ordered_keys: &[String], groups: &[GroupRecord]) -> Self {
        let mut out = String::with_capacity(
            container.len() + ordered_keys.iter().map(|k| k.len() + 1).sum::<usize>() + 64,
        );
        out.push_str(container);
        out.push(SECTION_SEP);
        push_joined(&mut out, ordered_keys.iter().map(String::as_str), FIELD_SEP);
        out.push(SECTION_SEP);

        for (i, group) in groups.iter().enumerate() {
            if i > 0 {
                out.push(RECORD_SEP);
            }
            let (start, end, unresolved, legacy_start, legacy_end) = match &group.anchor {
                GroupAnchor::Resolved { start, end } => {
                    (Some(start.as_str()), Some(end.as_str()), false, None, None)
                }
                GroupAnchor::Unresolved(rest) => (
                    rest.start.as_deref(),
                    rest.end.as_deref(),
                    true,
                    rest.legacy_start,
                    rest.legacy_end,
                ),
            };
            let legacy_start = legacy_start.map(|v| v.to_string()).unwrap_or_default();
            let legacy_end = legacy_end.map(|v| v.to_string()).unwrap_or_default();
            push_joined(
                &mut out,
                [
                    group.name.as_str(),
                    start.unwrap_or_default(),
                    end.unwrap_or_default(),
                    group.mode.as_str(),
                    if unresolved { "1" } else { "0" },
                    legacy_start.as_str(),
                    legacy_end.as_str(),
                ]
                .into_iter(),
                FIELD_SEP,
            );
        }
        Self(out)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short stable fingerprint for log lines.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let digest = Sha256::digest(self.0.as_bytes());
        u64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ])
    }
}

fn push_joined<'a>(out: &mut String, parts: impl Iterator<Item = &'a str>, sep: char) {
    for (i, part) in parts.enumerate() {
        if i > 0 {
            out.push(sep);
        }
        out.push_str(part);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grouping_records::{GroupMode, UnresolvedAnchor};

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn group(name: &str, start: &str, end: &str) -> GroupRecord {
        GroupRecord {
            id: format!("id-{name}"),
            name: name.to_string(),
            mode: GroupMode::Inclusive,
            anchor: GroupAnchor::resolved(start, end),
        }
    }

    #[test]
    fn identical_inputs_match() {
        let a = Signature::compute("p", &keys(&["a", "b"]), &[group("g", "a", "b")]);
        let b = Signature::compute("p", &keys(&["a", "b"]), &[group("g", "a", "b")]);
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn key_boundaries_are_unambiguous() {
        let a = Signature::compute("p", &keys(&["ab", "c"]), &[]);
        let b = Signature::compute("p", &keys(&["a", "bc"]), &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn every_group_field_participates() {
        let base = Signature::compute("p", &keys(&["a", "b"]), &[group("g", "a", "b")]);
        assert_ne!(
            base,
            Signature::compute("p", &keys(&["a", "b"]), &[group("h", "a", "b")])
        );
        assert_ne!(
            base,
            Signature::compute("p", &keys(&["a", "b"]), &[group("g", "b", "b")])
        );
        assert_ne!(
            base,
            Signature::compute("q", &keys(&["a", "b"]), &[group("g", "a", "b")])
        );
        let mut flagged = group("g", "a", "b");
        flagged.anchor = GroupAnchor::Unresolved(UnresolvedAnchor {
            start: Some("a".to_string()),
            end: Some("b".to_string()),
            ..UnresolvedAnchor::default()
        });
        assert_ne!(
            base,
            Signature::compute("p", &keys(&["a", "b"]), &[flagged])
        );
    }

    #[test]
    fn group_ids_do_not_participate() {
        let mut other = group("g", "a", "b");
        other.id = "regenerated".to_string();
        assert_eq!(
            Signature::compute("p", &keys(&["a", "b"]), &[group("g", "a", "b")]),
            Signature::compute("p", &keys(&["a", "b"]), &[other])
        );
    }
}
