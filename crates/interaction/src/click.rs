use crate::config::GestureConfig;
use std::time::Instant;

/// A click on an entry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickTarget {
    /// Position of the entry in the live list
    pub index: usize,
    /// Landed on a toggle, button or other control inside the row
    pub interactive: bool,
}

impl ClickTarget {
    #[must_use]
    pub const fn entry(index: usize) -> Self {
        Self {
            index,
            interactive: false,
        }
    }

    #[must_use]
    pub const fn control(index: usize) -> Self {
        Self {
            index,
            interactive: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Not counted at all.
    Ignored,
    /// Sequence in progress with this many clicks.
    Counting(u8),
    /// Threshold reached on `index`; state is reset.
    OpenMenu { index: usize },
}

/// Multi-click recognizer for opening the group menu on one entry.
#[derive(Debug, Clone)]
pub struct ClickSequencer {
    clicks_to_open: u8,
    window: std::time::Duration,
    count: u8,
    last_index: Option<usize>,
    expires_at: Option<Instant>,
}

impl ClickSequencer {
    #[must_use]
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            clicks_to_open: config.clicks_to_open,
            window: config.click_window,
            count: 0,
            last_index: None,
            expires_at: None,
        }
    }

    pub fn click(&mut self, target: ClickTarget, now: Instant) -> ClickOutcome {
        if target.interactive {
            return ClickOutcome::Ignored;
        }
        self.expire(now);

        if self.last_index == Some(target.index) {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = 1;
            self.last_index = Some(target.index);
        }

        if self.count >= self.clicks_to_open {
            self.reset();
            return ClickOutcome::OpenMenu {
                index: target.index,
            };
        }
        self.expires_at = Some(now + self.window);
        ClickOutcome::Counting(self.count)
    }

    /// Drop the sequence once the window elapsed without a click.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) if now >= deadline => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last_index = None;
        self.expires_at = None;
    }

    #[must_use]
    pub const fn count(&self) -> u8 {
        self.count
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn three_quick_clicks_open_menu() {
        let mut seq = ClickSequencer::new(&GestureConfig::default());
        let t = Instant::now();
        assert_eq!(seq.click(ClickTarget::entry(2), t), ClickOutcome::Counting(1));
        assert_eq!(
            seq.click(ClickTarget::entry(2), t + ms(300)),
            ClickOutcome::Counting(2)
        );
        assert_eq!(
            seq.click(ClickTarget::entry(2), t + ms(600)),
            ClickOutcome::OpenMenu { index: 2 }
        );
        assert_eq!(seq.count(), 0);
        assert_eq!(seq.deadline(), None);
    }

    #[test]
    fn window_rolls_with_every_click() {
        let mut seq = ClickSequencer::new(&GestureConfig::default());
        let t = Instant::now();
        seq.click(ClickTarget::entry(0), t);
        seq.click(ClickTarget::entry(0), t + ms(900));
        assert_eq!(
            seq.click(ClickTarget::entry(0), t + ms(1_800)),
            ClickOutcome::OpenMenu { index: 0 }
        );
    }

    #[test]
    fn pause_longer_than_window_restarts() {
        let mut seq = ClickSequencer::new(&GestureConfig::default());
        let t = Instant::now();
        seq.click(ClickTarget::entry(0), t);
        seq.click(ClickTarget::entry(0), t + ms(100));
        assert_eq!(
            seq.click(ClickTarget::entry(0), t + ms(1_200)),
            ClickOutcome::Counting(1)
        );
    }

    #[test]
    fn other_entry_resets_to_one() {
        let mut seq = ClickSequencer::new(&GestureConfig::default());
        let t = Instant::now();
        seq.click(ClickTarget::entry(0), t);
        seq.click(ClickTarget::entry(0), t + ms(100));
        assert_eq!(
            seq.click(ClickTarget::entry(1), t + ms(200)),
            ClickOutcome::Counting(1)
        );
        assert_eq!(
            seq.click(ClickTarget::entry(1), t + ms(300)),
            ClickOutcome::Counting(2)
        );
    }

    #[test]
    fn control_clicks_are_not_counted() {
        let mut seq = ClickSequencer::new(&GestureConfig::default());
        let t = Instant::now();
        seq.click(ClickTarget::entry(4), t);
        assert_eq!(
            seq.click(ClickTarget::control(4), t + ms(100)),
            ClickOutcome::Ignored
        );
        assert_eq!(seq.count(), 1);
        assert_eq!(
            seq.click(ClickTarget::entry(4), t + ms(200)),
            ClickOutcome::Counting(2)
        );
    }
}
