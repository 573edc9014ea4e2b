use crate::config::SyncConfig;
use crate::reconciler::{AbortReason, ReconcileOutcome, Reconciler};
use crate::scheduler::{TaskTag, TimerQueue};
use crate::view::{
    classify, EventSink, Relevance, SettingsEvents, SubscriptionId, ViewAdapter, ViewEvent, ViewId,
};
use crate::{EngineError, Result};
use grouping_records::{read_all, GroupStore, HostDocuments};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of one watched container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Constructed, `init` not called yet.
    Idle,
    Observing,
    /// A pass wrote to the view; its own mutations are being ignored.
    Applying,
    /// Torn down by `destroy`.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub state: SyncState,
    pub passes: u64,
    pub rebuilds: u64,
    /// Mutation batches dropped because the guard was set.
    pub ignored_mutations: u64,
    pub unresolved_groups: usize,
    pub last_outcome: Option<ReconcileOutcome>,
}

impl EngineStatus {
    fn initial() -> Self {
        Self {
            state: SyncState::Idle,
            passes: 0,
            rebuilds: 0,
            ignored_mutations: 0,
            unresolved_groups: 0,
            last_outcome: None,
        }
    }
}

/// Feedback-safe synchronizer between stored groups and one live view.
///
/// The engine never sleeps. Callers feed it events and the current time, then
/// call [`GroupingEngine::run_due`] once [`GroupingEngine::next_deadline`] has
/// passed. [`crate::spawn_engine`] does exactly that on a tokio task.
pub struct GroupingEngine<V> {
    view: V,
    store: Arc<GroupStore<dyn HostDocuments>>,
    settings: Option<Arc<dyn SettingsEvents>>,
    config: SyncConfig,
    timers: TimerQueue,
    reconciler: Reconciler,
    guard: bool,
    sink: Option<EventSink>,
    subscription: Option<SubscriptionId>,
    observed_view: Option<ViewId>,
    status: EngineStatus,
}

impl<V: ViewAdapter> GroupingEngine<V> {
    pub fn new(view: V, store: Arc<GroupStore<dyn HostDocuments>>, config: SyncConfig) -> Result<Self> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        Ok(Self {
            view,
            store,
            settings: None,
            reconciler: Reconciler::new(&config),
            config,
            timers: TimerQueue::new(),
            guard: false,
            sink: None,
            subscription: None,
            observed_view: None,
            status: EngineStatus::initial(),
        })
    }

    /// Listen for host settings changes once initialized.
    #[must_use]
    pub fn with_settings(mut self, settings: Arc<dyn SettingsEvents>) -> Self {
        self.settings = Some(settings);
        self
    }

    #[must_use]
    pub const fn status(&self) -> &EngineStatus {
        &self.status
    }

    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.status.state
    }

    #[must_use]
    pub const fn is_guarded(&self) -> bool {
        self.guard
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn view(&self) -> &V {
        &self.view
    }

    #[must_use]
    pub fn is_scheduled(&self, tag: TaskTag) -> bool {
        self.timers.is_scheduled(tag)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    const fn is_active(&self) -> bool {
        matches!(self.status.state, SyncState::Observing | SyncState::Applying)
    }

    /// Attach observers and schedule the first pass.
    ///
    /// Returns `false` without side effects when already initialized.
    pub fn init(&mut self, sink: EventSink, now: Instant) -> bool {
        if self.is_active() {
            debug!("grouping engine already initialized");
            return false;
        }
        if let Err(err) = self.view.observe(sink.clone()) {
            warn!("failed to observe entry container: {err}");
            return false;
        }
        self.observed_view = self.view.view_id();

        if let Some(settings) = &self.settings {
            self.subscription = settings.subscribe(sink.clone());
            if self.subscription.is_none() {
                debug!("host has no settings events; refresh bursts disabled");
            }
        }
        self.sink = Some(sink);
        self.status.state = SyncState::Observing;
        self.timers.schedule_immediate(TaskTag::Immediate, now);
        info!("grouping engine initialized");
        true
    }

    /// Cancel everything and restore the ungrouped view. Safe from any state.
    pub fn destroy(&mut self) {
        if matches!(self.status.state, SyncState::Disabled) {
            return;
        }
        let was_active = self.is_active();
        self.timers.clear();
        self.view.disconnect();
        if let (Some(settings), Some(id)) = (&self.settings, self.subscription.take()) {
            settings.unsubscribe(id);
        }
        if was_active {
            if let Err(err) = self.view.unwrap_all() {
                warn!("failed to unwrap groups during teardown: {err}");
            }
        }
        self.reconciler.reset();
        self.guard = false;
        self.sink = None;
        self.observed_view = None;
        self.status.state = SyncState::Disabled;
        info!("grouping engine destroyed");
    }

    /// React to one observed event.
    pub fn handle_event(&mut self, event: ViewEvent, now: Instant) {
        if !self.is_active() {
            return;
        }
        match event {
            ViewEvent::Mutations(records) => {
                if self.guard {
                    self.status.ignored_mutations += 1;
                    return;
                }
                match classify(&records, &self.config.identifier_attribute) {
                    Relevance::Ignored => {}
                    Relevance::Entries => {
                        self.timers
                            .schedule_debounced(TaskTag::Debounced, self.config.debounce, now);
                    }
                    Relevance::Wrappers => {
                        debug!("group wrappers changed externally; scheduling immediate pass");
                        self.schedule_immediate_with_follow_up(now);
                    }
                }
            }
            ViewEvent::ContainerReplaced => self.reattach(now),
            ViewEvent::SettingsChanged => {
                self.refresh_burst(now);
            }
        }
    }

    /// One immediate pass plus the delayed burst passes.
    pub fn refresh_burst(&mut self, now: Instant) -> bool {
        if !self.is_active() {
            return false;
        }
        self.timers.schedule_immediate(TaskTag::Immediate, now);
        for (step, delay) in self.config.refresh_burst.iter().enumerate() {
            let step = u8::try_from(step).unwrap_or(u8::MAX);
            self.timers
                .schedule_debounced(TaskTag::Burst(step), *delay, now);
        }
        true
    }

    /// Schedule a pass on the next tick, e.g. after a local group edit.
    pub fn refresh(&mut self, now: Instant) -> bool {
        if !self.is_active() {
            return false;
        }
        self.timers.schedule_immediate(TaskTag::Immediate, now);
        true
    }

    /// Run every task due at `now`. Several due passes collapse into one.
    pub fn run_due(&mut self, now: Instant) -> Option<ReconcileOutcome> {
        if !self.is_active() {
            return None;
        }
        let due = self.timers.take_due(now);
        if due.contains(&TaskTag::ReleaseGuard) {
            self.guard = false;
            self.status.state = SyncState::Observing;
        }
        if !due.iter().any(|tag| tag.is_pass()) {
            return None;
        }
        Some(self.run_pass(now))
    }

    fn run_pass(&mut self, now: Instant) -> ReconcileOutcome {
        self.guard = true;
        self.status.state = SyncState::Applying;
        self.status.passes += 1;

        let outcome = self.reconcile_once();
        match &outcome {
            ReconcileOutcome::RetryScheduled { delay_ms, .. } => {
                self.timers.schedule_debounced(
                    TaskTag::Retry,
                    Duration::from_millis(*delay_ms),
                    now,
                );
            }
            ReconcileOutcome::Rebuilt(summary) => {
                self.status.unresolved_groups = summary.unresolved;
            }
            _ => {}
        }

        // Our own writes may still be dispatching; release on the next tick.
        self.timers.schedule_immediate(TaskTag::ReleaseGuard, now);
        self.status.rebuilds = self.reconciler.rebuild_count();
        self.status.last_outcome = Some(outcome.clone());
        outcome
    }

    fn reconcile_once(&mut self) -> ReconcileOutcome {
        let Some(container) = self.store.host().active_container_name() else {
            debug!("no active container; skipping pass");
            return ReconcileOutcome::NoActiveContainer;
        };
        let keys = match self.view.ordered_keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!("failed to read entry order: {err}");
                return ReconcileOutcome::Aborted {
                    reason: AbortReason::View(err.to_string()),
                };
            }
        };
        let raw = match self.store.raw_groups(&container) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("failed to read groups of {container}: {err}");
                return ReconcileOutcome::Aborted {
                    reason: AbortReason::Host(err.to_string()),
                };
            }
        };
        let groups = read_all(&raw, &keys, &self.store.config().default_group_name);
        self.reconciler
            .reconcile(&mut self.view, &container, &keys, &groups)
    }

    fn schedule_immediate_with_follow_up(&mut self, now: Instant) {
        self.timers.schedule_immediate(TaskTag::Immediate, now);
        self.timers
            .schedule_debounced(TaskTag::FollowUp, self.config.follow_up, now);
    }

    fn reattach(&mut self, now: Instant) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        self.view.disconnect();
        if let Err(err) = self.view.observe(sink) {
            warn!("failed to re-attach to replaced container: {err}");
            return;
        }
        let current = self.view.view_id();
        if current != self.observed_view {
            debug!("entry container replaced; observer re-attached");
        }
        self.observed_view = current;
        self.schedule_immediate_with_follow_up(now);
    }
}

impl<V> Drop for GroupingEngine<V> {
    fn drop(&mut self) {
        if let (Some(settings), Some(id)) = (&self.settings, self.subscription.take()) {
            settings.unsubscribe(id);
        }
    }
}
