use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Named slots in the timer queue. Scheduling a tag replaces its pending run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskTag {
    /// Ordinary relevant mutations, coalesced.
    Debounced,
    /// Next-tick pass for wrapper churn, refreshes and init.
    Immediate,
    /// Guaranteed pass shortly after an immediate one.
    FollowUp,
    /// Step of a settings-change refresh burst.
    Burst(u8),
    /// Retry after a pass in which nothing resolved.
    Retry,
    /// Clear the feedback guard once the apply pass has settled.
    ReleaseGuard,
}

impl TaskTag {
    /// Whether running this tag means running a reconciliation pass.
    #[must_use]
    pub const fn is_pass(self) -> bool {
        !matches!(self, Self::ReleaseGuard)
    }
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    due: Instant,
    seq: u64,
}

/// Single timer wheel with last-call-wins per tag.
#[derive(Debug, Default)]
pub struct TimerQueue {
    pending: HashMap<TaskTag, Scheduled>,
    seq: u64,
}

impl TimerQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `tag` after `delay`, replacing any pending run of the same tag.
    pub fn schedule_debounced(&mut self, tag: TaskTag, delay: Duration, now: Instant) {
        self.seq += 1;
        self.pending.insert(
            tag,
            Scheduled {
                due: now + delay,
                seq: self.seq,
            },
        );
    }

    /// Run `tag` on the next tick.
    pub fn schedule_immediate(&mut self, tag: TaskTag, now: Instant) {
        self.schedule_debounced(tag, Duration::ZERO, now);
    }

    pub fn cancel(&mut self, tag: TaskTag) -> bool {
        self.pending.remove(&tag).is_some()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    #[must_use]
    pub fn is_scheduled(&self, tag: TaskTag) -> bool {
        self.pending.contains_key(&tag)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|s| s.due).min()
    }

    /// Remove and return every tag due at `now`, earliest first.
    ///
    /// Tags scheduled while the caller handles the result wait for the next call.
    pub fn take_due(&mut self, now: Instant) -> Vec<TaskTag> {
        let mut due: Vec<(TaskTag, Scheduled)> = self
            .pending
            .iter()
            .filter(|(_, s)| s.due <= now)
            .map(|(tag, s)| (*tag, *s))
            .collect();
        due.sort_by_key(|(_, s)| (s.due, s.seq));
        for (tag, _) in &due {
            self.pending.remove(tag);
        }
        due.into_iter().map(|(tag, _)| tag).collect()
    }
}
