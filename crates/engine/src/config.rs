use std::time::Duration;

/// Timing and filtering knobs of the view synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Settle time for ordinary relevant mutations
    pub debounce: Duration,

    /// Extra pass after an immediate (wrapper-touching) pass
    pub follow_up: Duration,

    /// Delayed passes after a theme/settings change
    pub refresh_burst: Vec<Duration>,

    /// Delay before each retry when no group resolves; the last value repeats
    pub retry_delays: Vec<Duration>,

    /// Retries per container before giving up
    pub max_retries: u8,

    /// Attribute on entry nodes carrying the stable identifier
    pub identifier_attribute: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            follow_up: Duration::from_millis(150),
            refresh_burst: [120, 420, 900, 1_800]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            retry_delays: vec![Duration::from_millis(450), Duration::from_millis(1_200)],
            max_retries: 3,
            identifier_attribute: "data-pm-identifier".to_string(),
        }
    }
}

impl SyncConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.debounce.is_zero() {
            return Err("debounce must be > 0".to_string());
        }
        if self.max_retries > 0 && self.retry_delays.is_empty() {
            return Err("retry_delays must not be empty when max_retries > 0".to_string());
        }
        if self.refresh_burst.len() > usize::from(u8::MAX) {
            return Err(format!(
                "refresh_burst has {} steps, at most {} supported",
                self.refresh_burst.len(),
                u8::MAX
            ));
        }
        if self.identifier_attribute.trim().is_empty() {
            return Err("identifier_attribute must not be empty".to_string());
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn retry_delay(&self, attempt: u8) -> Duration {
        let idx = usize::from(attempt.saturating_sub(1));
        self.retry_delays
            .get(idx)
            .or_else(|| self.retry_delays.last())
            .copied()
            .unwrap_or(self.debounce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn retry_delays_escalate_then_repeat() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.retry_delay(1), Duration::from_millis(450));
        assert_eq!(cfg.retry_delay(2), Duration::from_millis(1_200));
        assert_eq!(cfg.retry_delay(3), Duration::from_millis(1_200));
    }

    #[test]
    fn zero_debounce_rejected() {
        let cfg = SyncConfig {
            debounce: Duration::ZERO,
            ..SyncConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
