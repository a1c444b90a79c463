use std::time::{Duration, Instant};

/// A Timer with a given duration after which it will enter into a "Ringing"
/// state. The Timer can be reset at an given time, or manually set to start
/// "Ringing" again.
///
/// Time is always passed in, never read from the clock, so that a whole node
/// can be driven from a single `now`.
#[derive(Clone, Debug)]
pub struct Timer {
    duration: Duration,
    last: Instant,
}

impl Timer {
    /// Creates a new Timer with a given duration, starting at `now`
    pub fn new(duration: Duration, now: Instant) -> Self {
        Self {
            duration,
            last: now,
        }
    }

    /// Creates a new Timer that is already ringing at `now`
    pub fn new_ringing(duration: Duration, now: Instant) -> Self {
        Self {
            duration,
            last: now.checked_sub(duration).unwrap_or(now),
        }
    }

    /// Reset the Timer to stop ringing and wait till 'duration' has elapsed
    /// again
    pub fn reset(&mut self, now: Instant) {
        self.last = now;
    }

    /// Gets whether or not the Timer is currently ringing
    pub fn ringing(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.duration
    }

    /// Returns true and resets when ringing
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.ringing(now) {
            self.reset(now);
            return true;
        }
        false
    }

    /// Manually causes the Timer to enter into a ringing state
    pub fn ring_manual(&mut self) {
        if let Some(last) = self.last.checked_sub(self.duration) {
            self.last = last;
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
