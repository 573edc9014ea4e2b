//! In-process view and settings fakes for exercising the engine without a host.

use crate::view::{
    EventSink, GroupLabel, MutationRecord, NodeRef, SettingsEvents, SubscriptionId, ViewAdapter,
    ViewEvent, ViewId,
};
use crate::{EngineError, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct ViewState {
    keys: Vec<String>,
    view_id: u64,
    mounted: bool,
    wrappers: Vec<(GroupLabel, Vec<String>)>,
    sink: Option<EventSink>,
    wrap_calls: usize,
    unwrap_calls: usize,
    observe_calls: usize,
    disconnect_calls: usize,
    notices: Vec<usize>,
    fail_reads: bool,
}

impl ViewState {
    fn emit(&self, event: ViewEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }
}

fn lock(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// View over a plain key list. Structural writes echo back as mutation events
/// the way a real observer would report them.
#[derive(Debug)]
pub struct RecordingView {
    state: Arc<Mutex<ViewState>>,
}

/// Second handle on a [`RecordingView`], kept by the test after the view moves
/// into the engine.
#[derive(Debug, Clone)]
pub struct ViewController {
    state: Arc<Mutex<ViewState>>,
}

impl RecordingView {
    #[must_use]
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ViewState {
                keys,
                view_id: 1,
                mounted: true,
                ..ViewState::default()
            })),
        }
    }

    #[must_use]
    pub fn controller(&self) -> ViewController {
        ViewController {
            state: Arc::clone(&self.state),
        }
    }
}

impl ViewController {
    /// Replace the entry order, reporting it as entry churn.
    pub fn set_keys(&self, keys: Vec<String>) {
        let mut state = lock(&self.state);
        let removed = state
            .keys
            .iter()
            .map(|k| NodeRef::Entry {
                key: Some(k.clone()),
            })
            .collect();
        let added = keys
            .iter()
            .map(|k| NodeRef::Entry {
                key: Some(k.clone()),
            })
            .collect();
        state.keys = keys;
        state.wrappers.clear();
        state.emit(ViewEvent::Mutations(vec![MutationRecord::ChildList {
            added,
            removed,
        }]));
    }

    /// Swap in a fresh container node without group wrappers.
    pub fn replace_container(&self) {
        let mut state = lock(&self.state);
        state.view_id += 1;
        state.wrappers.clear();
        state.emit(ViewEvent::ContainerReplaced);
    }

    pub fn unmount(&self) {
        let mut state = lock(&self.state);
        state.mounted = false;
        state.wrappers.clear();
    }

    /// The host re-rendered the list and dropped our wrappers.
    pub fn strip_wrappers(&self) {
        let mut state = lock(&self.state);
        if state.wrappers.is_empty() {
            return;
        }
        let removed = state.wrappers.iter().map(|_| NodeRef::GroupWrapper).collect();
        state.wrappers.clear();
        state.emit(ViewEvent::Mutations(vec![MutationRecord::ChildList {
            added: Vec::new(),
            removed,
        }]));
    }

    /// Attribute churn no pass should react to.
    pub fn unrelated_style_change(&self) {
        let state = lock(&self.state);
        let target = state
            .keys
            .first()
            .map_or(NodeRef::Other, |k| NodeRef::Entry {
                key: Some(k.clone()),
            });
        state.emit(ViewEvent::Mutations(vec![MutationRecord::Attribute {
            target,
            attribute: "style".to_string(),
        }]));
    }

    pub fn fail_reads(&self, fail: bool) {
        lock(&self.state).fail_reads = fail;
    }

    #[must_use]
    pub fn wrappers(&self) -> Vec<(GroupLabel, Vec<String>)> {
        lock(&self.state).wrappers.clone()
    }

    #[must_use]
    pub fn wrap_calls(&self) -> usize {
        lock(&self.state).wrap_calls
    }

    #[must_use]
    pub fn unwrap_calls(&self) -> usize {
        lock(&self.state).unwrap_calls
    }

    #[must_use]
    pub fn observe_calls(&self) -> usize {
        lock(&self.state).observe_calls
    }

    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        lock(&self.state).disconnect_calls
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        lock(&self.state).sink.is_some()
    }

    /// Every unresolved count shown, in order.
    #[must_use]
    pub fn notices(&self) -> Vec<usize> {
        lock(&self.state).notices.clone()
    }
}

impl ViewAdapter for RecordingView {
    fn view_id(&self) -> Option<ViewId> {
        let state = lock(&self.state);
        state.mounted.then_some(ViewId(state.view_id))
    }

    fn ordered_keys(&self) -> Result<Vec<String>> {
        let state = lock(&self.state);
        if state.fail_reads {
            return Err(EngineError::view("entry list unavailable"));
        }
        Ok(state.keys.clone())
    }

    fn has_presentation(&self) -> bool {
        !lock(&self.state).wrappers.is_empty()
    }

    fn wrap_range(&mut self, keys: &[String], label: &GroupLabel) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.mounted {
            return Err(EngineError::view("container not mounted"));
        }
        state.wrap_calls += 1;
        state.wrappers.push((label.clone(), keys.to_vec()));
        state.emit(ViewEvent::Mutations(vec![MutationRecord::ChildList {
            added: vec![NodeRef::GroupWrapper],
            removed: keys
                .iter()
                .map(|k| NodeRef::Entry {
                    key: Some(k.clone()),
                })
                .collect(),
        }]));
        Ok(())
    }

    fn unwrap_all(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.unwrap_calls += 1;
        if state.wrappers.is_empty() {
            return Ok(());
        }
        let removed = state.wrappers.iter().map(|_| NodeRef::GroupWrapper).collect();
        state.wrappers.clear();
        state.emit(ViewEvent::Mutations(vec![MutationRecord::ChildList {
            added: Vec::new(),
            removed,
        }]));
        Ok(())
    }

    fn observe(&mut self, sink: EventSink) -> Result<()> {
        let mut state = lock(&self.state);
        state.observe_calls += 1;
        state.sink = Some(sink);
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = lock(&self.state);
        if state.sink.take().is_some() {
            state.disconnect_calls += 1;
        }
    }

    fn show_unresolved_notice(&mut self, count: usize) {
        lock(&self.state).notices.push(count);
    }
}

#[derive(Debug, Default)]
struct BusState {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, EventSink)>,
    available: bool,
}

/// Settings-changed event source.
#[derive(Debug, Clone)]
pub struct SettingsBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for SettingsBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                available: true,
                ..BusState::default()
            })),
        }
    }

    /// Bus of a host without an event API.
    #[must_use]
    pub fn unavailable() -> Self {
        let bus = Self::new();
        bus.lock().available = false;
        bus
    }

    /// Fire a settings-changed event at every subscriber.
    pub fn publish(&self) -> usize {
        let state = self.lock();
        state
            .subscribers
            .iter()
            .filter(|(_, sink)| sink.emit(ViewEvent::SettingsChanged))
            .count()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsEvents for SettingsBus {
    fn subscribe(&self, sink: EventSink) -> Option<SubscriptionId> {
        let mut state = self.lock();
        if !state.available {
            return None;
        }
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.subscribers.push((id, sink));
        Some(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().subscribers.retain(|(sub, _)| *sub != id);
    }
}
