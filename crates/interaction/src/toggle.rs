use crate::Result;
use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;

/// Aggregate enabled state of a group's members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleState {
    Off,
    On,
    Mixed,
}

impl ToggleState {
    #[must_use]
    pub const fn from_counts(enabled: usize, total: usize) -> Self {
        if enabled == 0 {
            Self::Off
        } else if enabled >= total {
            Self::On
        } else {
            Self::Mixed
        }
    }

    /// Enabled state a click applies to every member.
    #[must_use]
    pub const fn click_target(self) -> bool {
        !matches!(self, Self::On)
    }
}

/// Host access to per-entry enabled flags.
#[async_trait]
pub trait EntryToggles: Send + Sync {
    /// `None` for keys the host does not know.
    fn is_enabled(&self, key: &str) -> Option<bool>;

    /// Set every key at once and persist. `Ok(false)` when the host has no batch API.
    async fn set_enabled_batch(&self, _keys: &[String], _enabled: bool) -> Result<bool> {
        Ok(false)
    }

    /// Flip one entry the way a user click on its toggle would.
    async fn toggle_entry(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleReport {
    pub before: ToggleState,
    pub after: ToggleState,
    /// Members whose state had to change.
    pub changed: usize,
    pub batched: bool,
}

/// State of `members`, ignoring keys unknown to the host.
pub fn group_state(toggles: &dyn EntryToggles, members: &[String]) -> ToggleState {
    let states: Vec<bool> = members
        .iter()
        .filter_map(|key| toggles.is_enabled(key))
        .collect();
    let enabled = states.iter().filter(|on| **on).count();
    ToggleState::from_counts(enabled, states.len())
}

/// Click on a group's toggle-all control.
pub async fn toggle_all(toggles: &dyn EntryToggles, members: &[String]) -> Result<ToggleReport> {
    let before = group_state(toggles, members);
    let target = before.click_target();
    let pending: Vec<String> = members
        .iter()
        .filter(|key| toggles.is_enabled(key).is_some_and(|on| on != target))
        .cloned()
        .collect();

    let batched = if pending.is_empty() {
        false
    } else {
        match toggles.set_enabled_batch(members, target).await {
            Ok(done) => done,
            Err(err) => {
                warn!("batch toggle failed, toggling entries one by one: {err}");
                false
            }
        }
    };
    if !batched {
        for key in &pending {
            toggles.toggle_entry(key).await?;
        }
    }

    let after = group_state(toggles, members);
    debug!(
        "toggled {} of {} group members ({before:?} -> {after:?})",
        pending.len(),
        members.len()
    );
    Ok(ToggleReport {
        before,
        after,
        changed: pending.len(),
        batched,
    })
}
