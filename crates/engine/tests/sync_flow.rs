use grouping_engine::test_support::{RecordingView, ViewController};
use grouping_engine::{
    EventSink, GroupingEngine, RebuildSummary, ReconcileOutcome, SyncConfig, SyncState, TaskTag,
    ViewEvent,
};
use grouping_records::{GroupStore, HostDocuments, MemoryHost, StoreConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

struct Harness {
    engine: GroupingEngine<RecordingView>,
    view: ViewController,
    host: Arc<MemoryHost>,
    store: Arc<GroupStore<dyn HostDocuments>>,
    rx: UnboundedReceiver<ViewEvent>,
    now: Instant,
}

impl Harness {
    fn new(entries: &[&str], groups: serde_json::Value) -> Self {
        let host = Arc::new(
            MemoryHost::new()
                .with_container("preset", json!({ "extensions": { "prompt_groups": groups } }))
                .with_active("preset"),
        );
        let dyn_host: Arc<dyn HostDocuments> = host.clone();
        let store = Arc::new(GroupStore::new(dyn_host, StoreConfig::default()));
        let view = RecordingView::new(keys(entries));
        let controller = view.controller();
        let mut engine =
            GroupingEngine::new(view, Arc::clone(&store), SyncConfig::default()).unwrap();
        let (sink, rx) = EventSink::channel();
        let now = Instant::now();
        assert!(engine.init(sink, now));
        Self {
            engine,
            view: controller,
            host,
            store,
            rx,
            now,
        }
    }

    /// Deliver pending events, then run whatever is due.
    fn tick(&mut self) -> Option<ReconcileOutcome> {
        while let Ok(event) = self.rx.try_recv() {
            self.engine.handle_event(event, self.now);
        }
        self.engine.run_due(self.now)
    }

    fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// Tick until no task is due at the current time.
    fn settle(&mut self) -> Vec<ReconcileOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..16 {
            let pending_events = !self.rx.is_empty();
            let due = self
                .engine
                .next_deadline()
                .is_some_and(|deadline| deadline <= self.now);
            if !pending_events && !due {
                break;
            }
            if let Some(outcome) = self.tick() {
                outcomes.push(outcome);
            }
        }
        outcomes
    }
}

#[test]
fn second_pass_without_change_is_a_no_op() {
    let mut h = Harness::new(
        &["a", "b", "c"],
        json!([{ "id": "g1", "name": "G", "startIdentifier": "a", "endIdentifier": "b" }]),
    );
    let first = h.settle();
    assert_eq!(first.len(), 1);
    assert_eq!(h.engine.status().rebuilds, 1);

    assert!(h.engine.refresh(h.now));
    let second = h.settle();
    assert_eq!(second, vec![ReconcileOutcome::Skipped]);
    assert_eq!(h.engine.status().rebuilds, 1);
    assert_eq!(h.view.wrap_calls(), 1);
}

#[test]
fn own_writes_do_not_schedule_another_pass() {
    let mut h = Harness::new(
        &["a", "b", "c", "d"],
        json!([
            { "id": "g1", "name": "One", "startIdentifier": "a", "endIdentifier": "b" },
            { "id": "g2", "name": "Two", "startIdentifier": "c", "endIdentifier": "d" }
        ]),
    );

    let outcome = h.engine.run_due(h.now);
    assert!(matches!(outcome, Some(ReconcileOutcome::Rebuilt(_))));
    assert!(h.engine.is_guarded());
    assert_eq!(h.engine.state(), SyncState::Applying);

    // The wrapper insertions are still queued while the guard is set.
    assert!(h.tick().is_none());
    assert!(!h.engine.is_guarded());
    assert_eq!(h.engine.status().ignored_mutations, 2);
    assert_eq!(h.engine.next_deadline(), None);
    assert_eq!(h.engine.state(), SyncState::Observing);

    // Much later nothing has run by itself.
    h.advance(Duration::from_secs(5));
    assert!(h.settle().is_empty());
    assert_eq!(h.engine.status().passes, 1);

    // An external change still goes through the debounce tier.
    h.view.set_keys(keys(&["c", "d", "a", "b"]));
    assert!(h.tick().is_none());
    assert!(h.engine.is_scheduled(TaskTag::Debounced));
    h.advance(Duration::from_millis(150));
    let outcomes = h.settle();
    assert!(matches!(outcomes.as_slice(), [ReconcileOutcome::Rebuilt(_)]));
    assert_eq!(h.engine.status().rebuilds, 2);
}

#[test]
fn unrelated_churn_is_ignored() {
    let mut h = Harness::new(&["a", "b"], json!([]));
    h.settle();
    h.view.unrelated_style_change();
    h.tick();
    assert_eq!(h.engine.next_deadline(), None);
}

#[test]
fn bursts_of_entry_changes_coalesce() {
    let mut h = Harness::new(
        &["a", "b"],
        json!([{ "id": "g1", "name": "G", "startIdentifier": "a", "endIdentifier": "b" }]),
    );
    h.settle();
    let passes = h.engine.status().passes;

    for order in [["b", "a"], ["a", "b"], ["b", "a"]] {
        h.view.set_keys(keys(&order));
        h.tick();
        h.advance(Duration::from_millis(100));
    }
    assert!(h.settle().is_empty());
    h.advance(Duration::from_millis(50));
    assert_eq!(h.settle().len(), 1);
    assert_eq!(h.engine.status().passes, passes + 1);
}

#[test]
fn stripped_wrappers_are_restored_immediately_with_follow_up() {
    let mut h = Harness::new(
        &["a", "b", "c"],
        json!([{ "id": "g1", "name": "G", "startIdentifier": "b", "endIdentifier": "c" }]),
    );
    h.settle();
    h.view.strip_wrappers();
    let outcomes = h.settle();
    assert!(matches!(outcomes.as_slice(), [ReconcileOutcome::Rebuilt(_)]));
    assert_eq!(h.view.wrappers().len(), 1);
    assert!(h.engine.is_scheduled(TaskTag::FollowUp));

    h.advance(Duration::from_millis(150));
    assert_eq!(h.settle(), vec![ReconcileOutcome::Skipped]);
}

#[test]
fn replaced_container_is_reobserved_and_regrouped() {
    let mut h = Harness::new(
        &["a", "b"],
        json!([{ "id": "g1", "name": "G", "startIdentifier": "a", "endIdentifier": "b" }]),
    );
    h.settle();
    h.view.replace_container();
    let outcomes = h.settle();
    assert!(matches!(outcomes.as_slice(), [ReconcileOutcome::Rebuilt(_)]));
    assert_eq!(h.view.observe_calls(), 2);
    assert!(h.view.is_observing());
}

#[test]
fn retries_escalate_then_give_up_silently() {
    let mut h = Harness::new(
        &["a"],
        json!([{ "id": "g1", "name": "G", "startIdentifier": "x", "endIdentifier": "y" }]),
    );
    assert!(matches!(
        h.settle().as_slice(),
        [ReconcileOutcome::RetryScheduled { attempt: 1, delay_ms: 450 }]
    ));
    h.advance(Duration::from_millis(450));
    assert!(matches!(
        h.settle().as_slice(),
        [ReconcileOutcome::RetryScheduled { attempt: 2, delay_ms: 1_200 }]
    ));
    h.advance(Duration::from_millis(1_200));
    assert!(matches!(
        h.settle().as_slice(),
        [ReconcileOutcome::RetryScheduled { attempt: 3, .. }]
    ));
    h.advance(Duration::from_millis(1_200));
    assert_eq!(
        h.settle(),
        vec![ReconcileOutcome::Rebuilt(RebuildSummary {
            rendered: 0,
            unresolved: 1,
            conflicts: 0,
            retries_exhausted: true,
        })]
    );
    h.advance(Duration::from_secs(10));
    assert!(h.settle().is_empty());
}

#[tokio::test]
async fn deleted_anchor_surfaces_as_single_warning() {
    let mut h = Harness::new(&["p1", "p2", "p3", "p4"], json!([]));
    h.settle();

    let ordered = keys(&["p1", "p2", "p3", "p4"]);
    h.store
        .add("preset", "p2", "p3", "Intro", &ordered)
        .await
        .unwrap();
    assert!(h.host.live_groups("prompt_groups").is_some());
    h.engine.refresh(h.now);
    h.settle();
    let wrappers = h.view.wrappers();
    assert_eq!(wrappers.len(), 1);
    assert_eq!(wrappers[0].0.name, "Intro");
    assert_eq!(wrappers[0].1, keys(&["p2", "p3"]));

    h.view.set_keys(keys(&["p1", "p3", "p4"]));
    h.tick();
    let mut outcomes = Vec::new();
    for delay in [150, 450, 1_200, 1_200] {
        h.advance(Duration::from_millis(delay));
        outcomes.extend(h.settle());
    }
    assert_eq!(
        outcomes.last(),
        Some(&ReconcileOutcome::Rebuilt(RebuildSummary {
            rendered: 0,
            unresolved: 1,
            conflicts: 0,
            retries_exhausted: true,
        }))
    );
    assert_eq!(h.view.notices().last(), Some(&1));
    assert_eq!(h.engine.status().unresolved_groups, 1);
    assert!(h.view.wrappers().is_empty());

    // Anchors are kept so the group comes back if p2 reappears.
    let records = h.store.read("preset", &keys(&["p1", "p3", "p4"])).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].anchor.keys(), Some(("p2", "p3")));
}

#[test]
fn no_active_container_skips_quietly() {
    let mut h = Harness::new(&["a"], json!([]));
    h.host.set_active(None);
    assert_eq!(h.settle(), vec![ReconcileOutcome::NoActiveContainer]);
    assert_eq!(h.engine.status().rebuilds, 0);
}
