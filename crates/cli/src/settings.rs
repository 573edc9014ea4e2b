use anyhow::{anyhow, Context, Result};
use grouping_engine::SyncConfig;
use grouping_interaction::GestureConfig;
use grouping_records::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Everything tunable, as read from a TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingSettings {
    pub store: StoreConfig,
    pub sync: SyncSettings,
    pub gestures: GestureSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub debounce_ms: u64,
    pub follow_up_ms: u64,
    pub refresh_burst_ms: Vec<u64>,
    pub retry_delays_ms: Vec<u64>,
    pub max_retries: u8,
    pub identifier_attribute: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let base = SyncConfig::default();
        Self {
            debounce_ms: millis(base.debounce),
            follow_up_ms: millis(base.follow_up),
            refresh_burst_ms: base.refresh_burst.iter().copied().map(millis).collect(),
            retry_delays_ms: base.retry_delays.iter().copied().map(millis).collect(),
            max_retries: base.max_retries,
            identifier_attribute: base.identifier_attribute,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    pub click_window_ms: u64,
    pub clicks_to_open: u8,
    pub long_press_ms: u64,
    pub long_press_slop_px: f64,
}

impl Default for GestureSettings {
    fn default() -> Self {
        let base = GestureConfig::default();
        Self {
            click_window_ms: millis(base.click_window),
            clicks_to_open: base.clicks_to_open,
            long_press_ms: millis(base.long_press),
            long_press_slop_px: base.long_press_slop,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl GroupingSettings {
    /// Defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read settings {}", path.display()))?;
        let settings: Self = toml::from_str(&raw)
            .with_context(|| format!("Invalid settings {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.store
            .validate()
            .map_err(|e| anyhow!("store: {e}"))?;
        self.sync_config()
            .validate()
            .map_err(|e| anyhow!("sync: {e}"))?;
        self.gesture_config()
            .validate()
            .map_err(|e| anyhow!("gestures: {e}"))?;
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            debounce: Duration::from_millis(self.sync.debounce_ms),
            follow_up: Duration::from_millis(self.sync.follow_up_ms),
            refresh_burst: self
                .sync
                .refresh_burst_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
            retry_delays: self
                .sync
                .retry_delays_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
            max_retries: self.sync.max_retries,
            identifier_attribute: self.sync.identifier_attribute.clone(),
        }
    }

    pub fn gesture_config(&self) -> GestureConfig {
        GestureConfig {
            click_window: Duration::from_millis(self.gestures.click_window_ms),
            clicks_to_open: self.gestures.clicks_to_open,
            long_press: Duration::from_millis(self.gestures.long_press_ms),
            long_press_slop: self.gestures.long_press_slop_px,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_round_trip_through_configs() {
        let settings = GroupingSettings::default();
        assert_eq!(settings.sync_config(), SyncConfig::default());
        assert_eq!(settings.gesture_config(), GestureConfig::default());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let settings: GroupingSettings = toml::from_str(
            r#"
            [store]
            storage_key = "groups_v2"

            [sync]
            debounce_ms = 300
            "#,
        )
        .unwrap();
        assert_eq!(settings.store.storage_key, "groups_v2");
        assert_eq!(settings.store.world_info_key, "world_info_groups");
        assert_eq!(settings.sync.debounce_ms, 300);
        assert_eq!(settings.sync.max_retries, 3);
        assert_eq!(settings.gestures.clicks_to_open, 3);
    }

    #[test]
    fn invalid_values_are_reported_by_section() {
        let settings: GroupingSettings = toml::from_str("[gestures]\nclicks_to_open = 1\n").unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().starts_with("gestures:"));
    }
}
