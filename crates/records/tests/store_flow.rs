use grouping_records::{
    read_all, resolve_all, write_all, GroupAnchor, GroupPatch, GroupStatus, GroupStore,
    MemoryHost, Span, StoreConfig, StoreError, UnresolvedAnchor, UnresolvedReason,
    DEFAULT_GROUP_NAME,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

fn preset_store() -> GroupStore<MemoryHost> {
    let host = MemoryHost::new()
        .with_container("Default", json!({"prompt_order": []}))
        .with_active("Default");
    GroupStore::new(Arc::new(host), StoreConfig::default())
}

#[test]
fn legacy_positional_record_migrates_or_stays_unresolved() {
    let raw = vec![json!({"startIndex": 1, "endIndex": 3})];

    let long = read_all(&raw, &keys(&["a", "b", "c", "d"]), DEFAULT_GROUP_NAME);
    assert_eq!(long[0].anchor, GroupAnchor::resolved("b", "d"));

    let short = read_all(&raw, &keys(&["a"]), DEFAULT_GROUP_NAME);
    assert_eq!(
        short[0].anchor,
        GroupAnchor::Unresolved(UnresolvedAnchor::legacy(1, 3))
    );
}

#[test]
fn write_then_read_keeps_resolved_fields() {
    let ordered = keys(&["a", "b", "c", "d", "e"]);
    let raw = vec![
        json!({"id": "g1", "name": "First", "startIdentifier": "a", "endIdentifier": "b", "mode": "inclusive"}),
        json!({"id": "g2", "name": "Second", "startIdentifier": "e", "endIdentifier": "c", "mode": "inclusive"}),
    ];
    let original = read_all(&raw, &ordered, DEFAULT_GROUP_NAME);
    let written: Vec<Value> = write_all(&raw, &ordered, DEFAULT_GROUP_NAME)
        .into_iter()
        .map(|g| serde_json::to_value(g).unwrap())
        .collect();
    let reread = read_all(&written, &ordered, DEFAULT_GROUP_NAME);

    for (a, b) in original.iter().zip(&reread) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.anchor, b.anchor);
        assert_eq!(a.mode, b.mode);
        assert_eq!(a.id, b.id);
    }
}

#[tokio::test]
async fn out_of_range_indices_leave_container_untouched() {
    let store = preset_store();
    let ordered = keys(&["p1", "p2"]);
    store
        .add("Default", "p1", "p2", "Only", &ordered)
        .await
        .unwrap();
    let before = store.raw_groups("Default").unwrap();
    let saves_before = store.host().saves().len();

    let len = before.len();
    let update = store
        .update("Default", len, GroupPatch::rename("x"), &ordered)
        .await;
    assert!(matches!(update, Err(StoreError::IndexOutOfRange { .. })));
    let remove = store.remove("Default", usize::MAX, &ordered).await;
    assert!(matches!(remove, Err(StoreError::IndexOutOfRange { .. })));

    assert_eq!(store.raw_groups("Default").unwrap(), before);
    assert_eq!(store.host().saves().len(), saves_before);
}

#[tokio::test]
async fn preset_scenario_add_then_lose_anchor() {
    let store = preset_store();
    let ordered = keys(&["p1", "p2", "p3", "p4"]);

    store
        .add("Default", "p2", "p3", "Intro", &ordered)
        .await
        .unwrap();
    let groups = store.read("Default", &ordered).unwrap();
    assert_eq!(groups.len(), 1);
    let resolution = resolve_all(&groups, &ordered);
    assert_eq!(
        resolution.groups[0].status,
        GroupStatus::Resolved {
            span: Span { start: 1, end: 2 }
        }
    );

    // Host deletes p2.
    let ordered = keys(&["p1", "p3", "p4"]);
    let groups = store.read("Default", &ordered).unwrap();
    let resolution = resolve_all(&groups, &ordered);
    assert!(resolution.groups[0].is_unresolved());
    assert_eq!(
        resolution.groups[0].status,
        GroupStatus::Unresolved {
            cause: UnresolvedReason::MissingAnchor("p2".to_string())
        }
    );
    assert_eq!(
        resolution.groups[0].record.anchor,
        GroupAnchor::resolved("p2", "p3")
    );
    assert_eq!(resolution.unresolved_count(), 1);
}
