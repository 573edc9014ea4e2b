//! Signature-gated rebuild of the group presentation.
//!
//! A rebuild unwraps every group container and wraps each resolved span again.
//! It is expensive and re-triggers the host's mutation observers, so it only
//! runs when the signature of `(container, keys, groups)` changed, the container
//! node changed, or the presentation vanished.

use crate::config::SyncConfig;
use crate::signature::Signature;
use crate::view::{GroupLabel, ViewAdapter, ViewId};
use grouping_records::{resolve_all, GroupRecord, Span};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub rendered: usize,
    pub unresolved: usize,
    /// Resolved groups skipped because an earlier group already claimed an entry.
    pub conflicts: usize,
    /// Built after the retry budget ran out with nothing resolved.
    pub retries_exhausted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AbortReason {
    /// The same key appears twice in the live sequence.
    DuplicateKey(String),
    View(String),
    Host(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Nothing changed since the last applied rebuild.
    Skipped,
    Rebuilt(RebuildSummary),
    /// Nothing resolved although groups exist; try again later.
    RetryScheduled { attempt: u8, delay_ms: u64 },
    Aborted { reason: AbortReason },
    /// The host has no active container to group.
    NoActiveContainer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Applied {
    signature: Signature,
    view: Option<ViewId>,
    rendered: usize,
}

#[derive(Debug, Default)]
struct RetryState {
    container: Option<String>,
    attempts: u8,
}

pub struct Reconciler {
    config: SyncConfig,
    applied: Option<Applied>,
    retry: RetryState,
    rebuilds: u64,
}

impl Reconciler {
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            config: config.clone(),
            applied: None,
            retry: RetryState::default(),
            rebuilds: 0,
        }
    }

    /// Number of rebuilds performed so far.
    #[must_use]
    pub const fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Forget the last applied state so the next pass rebuilds.
    pub fn invalidate(&mut self) {
        self.applied = None;
    }

    pub fn reset(&mut self) {
        self.applied = None;
        self.retry = RetryState::default();
    }

    /// One reconciliation decision, rebuilding through `view` when needed.
    pub fn reconcile<V: ViewAdapter + ?Sized>(
        &mut self,
        view: &mut V,
        container: &str,
        ordered_keys: &[String],
        groups: &[GroupRecord],
    ) -> ReconcileOutcome {
        if self.retry.container.as_deref() != Some(container) {
            self.retry = RetryState {
                container: Some(container.to_string()),
                attempts: 0,
            };
        }

        if let Some(key) = first_duplicate(ordered_keys) {
            warn!("duplicate entry key {key:?} in {container}; skipping group rebuild");
            return ReconcileOutcome::Aborted {
                reason: AbortReason::DuplicateKey(key.to_string()),
            };
        }

        let signature = Signature::compute(container, ordered_keys, groups);
        let view_id = view.view_id();
        if let Some(applied) = &self.applied {
            let presented = applied.rendered == 0 || view.has_presentation();
            if applied.signature == signature && applied.view == view_id && presented {
                debug!(
                    "group signature {:016x} unchanged; skipping rebuild",
                    signature.fingerprint()
                );
                return ReconcileOutcome::Skipped;
            }
        }

        let resolution = resolve_all(groups, ordered_keys);
        let mut retries_exhausted = false;
        if resolution.resolved_count() == 0 && resolution.eligible_count() > 0 {
            if self.retry.attempts < self.config.max_retries {
                self.retry.attempts += 1;
                let delay = self.config.retry_delay(self.retry.attempts);
                debug!(
                    "no group resolved in {container}; retry {} in {}ms",
                    self.retry.attempts,
                    delay.as_millis()
                );
                return ReconcileOutcome::RetryScheduled {
                    attempt: self.retry.attempts,
                    delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                };
            }
            debug!("no group resolved in {container} after retries; rendering ungrouped");
            retries_exhausted = true;
        }

        if let Err(err) = view.unwrap_all() {
            warn!("failed to clear group containers: {err}");
            return ReconcileOutcome::Aborted {
                reason: AbortReason::View(err.to_string()),
            };
        }

        let mut spans: Vec<(&GroupRecord, Span)> = resolution.resolved().collect();
        spans.sort_by_key(|(_, span)| (span.start, span.end));

        let mut claimed: HashSet<usize> = HashSet::new();
        let mut summary = RebuildSummary {
            unresolved: resolution.unresolved_count(),
            retries_exhausted,
            ..RebuildSummary::default()
        };
        for (record, span) in spans {
            if (span.start..=span.end).any(|idx| claimed.contains(&idx)) {
                warn!(
                    "group {:?} overlaps an earlier group after reordering; not rendered",
                    record.name
                );
                summary.conflicts += 1;
                continue;
            }
            let label = GroupLabel {
                id: record.id.clone(),
                name: record.name.clone(),
                ordinal: summary.rendered,
                span,
            };
            if let Err(err) = view.wrap_range(span.keys(ordered_keys), &label) {
                warn!("failed to wrap group {:?}: {err}", record.name);
                return ReconcileOutcome::Aborted {
                    reason: AbortReason::View(err.to_string()),
                };
            }
            claimed.extend(span.start..=span.end);
            summary.rendered += 1;
        }

        view.show_unresolved_notice(summary.unresolved);
        if summary.unresolved > 0 {
            warn!(
                "{} group(s) in {container} could not be resolved",
                summary.unresolved
            );
        }

        if summary.rendered > 0 {
            self.retry.attempts = 0;
        }
        self.applied = Some(Applied {
            signature,
            view: view_id,
            rendered: summary.rendered,
        });
        self.rebuilds += 1;
        info!(
            "rebuilt {} group(s) in {container} (unresolved {}, conflicts {})",
            summary.rendered, summary.unresolved, summary.conflicts
        );
        ReconcileOutcome::Rebuilt(summary)
    }
}

fn first_duplicate(keys: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.iter()
        .find(|key| !seen.insert(key.as_str()))
        .map(String::as_str)
}
