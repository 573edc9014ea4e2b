use crate::config::GestureConfig;
use std::time::{Duration, Instant};

/// Pointer position in view pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy)]
struct Press {
    uid: u64,
    origin: Point,
    started: Instant,
}

/// Press-and-hold recognizer for opening an entry's context menu.
#[derive(Debug, Clone)]
pub struct LongPress {
    hold: Duration,
    slop: f64,
    pending: Option<Press>,
}

impl LongPress {
    #[must_use]
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            hold: config.long_press,
            slop: config.long_press_slop,
            pending: None,
        }
    }

    /// Start tracking a press on entry `uid`, replacing any pending one.
    pub fn press(&mut self, uid: u64, at: Point, now: Instant) {
        self.pending = Some(Press {
            uid,
            origin: at,
            started: now,
        });
    }

    /// Cancel when the pointer strays beyond the slop radius.
    pub fn moved(&mut self, to: Point) {
        if let Some(press) = self.pending {
            if press.origin.distance(to) > self.slop {
                self.pending = None;
            }
        }
    }

    /// Release before the hold time elapsed: a plain click.
    pub fn release(&mut self) {
        self.pending = None;
    }

    /// Uid of the entry whose press completed by `now`. Fires once.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        let press = self.pending?;
        if now.duration_since(press.started) < self.hold {
            return None;
        }
        self.pending = None;
        Some(press.uid)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|press| press.started + self.hold)
    }
}
