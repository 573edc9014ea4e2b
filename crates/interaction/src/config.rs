use std::time::Duration;

/// Gesture thresholds of the interaction surface.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    /// Rolling window between consecutive clicks; restarts on every click
    pub click_window: Duration,

    /// Same-entry clicks that open the group menu
    pub clicks_to_open: u8,

    /// Hold time before a press becomes a long press
    pub long_press: Duration,

    /// Pointer travel (px) that cancels a pending long press
    pub long_press_slop: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            click_window: Duration::from_secs(1),
            clicks_to_open: 3,
            long_press: Duration::from_millis(550),
            long_press_slop: 8.0,
        }
    }
}

impl GestureConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.click_window.is_zero() {
            return Err("click_window must be > 0".to_string());
        }
        if self.clicks_to_open < 2 {
            return Err("clicks_to_open must be >= 2".to_string());
        }
        if self.long_press.is_zero() {
            return Err("long_press must be > 0".to_string());
        }
        if !self.long_press_slop.is_finite() || self.long_press_slop < 0.0 {
            return Err("long_press_slop must be a non-negative number".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(GestureConfig::default().validate().is_ok());
    }

    #[test]
    fn single_click_menu_rejected() {
        let cfg = GestureConfig {
            clicks_to_open: 1,
            ..GestureConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
