use std::time::Duration;

use log::debug;

use haze_shared::LeaderConfig;

/// A randomly seeded countdown that decides when this node may change the
/// topology.
///
/// The countdown starts somewhere in `[initial_min, initial_max]` and decays
/// at a random rate per real second. Once it reaches zero the node may lead
/// once. Hearing another node's `LeaderNotify` starts a new epoch. A leader
/// that hears no notify re-arms for another random hold and may then lead
/// again, so a lone node still makes progress.
pub struct LeaderTimer {
    config: LeaderConfig,
    rng: fastrand::Rng,
    remaining: f32,
    decay_rate: f32,
    has_led: bool,
}

impl LeaderTimer {
    pub fn new(config: LeaderConfig, rng: fastrand::Rng) -> Self {
        let mut timer = Self {
            config,
            rng,
            remaining: 0.0,
            decay_rate: 1.0,
            has_led: false,
        };
        timer.arm();
        timer
    }

    fn arm(&mut self) {
        let min = self.config.initial_min.as_secs_f32();
        let max = self.config.initial_max.as_secs_f32().max(min);
        self.remaining = min + self.rng.f32() * (max - min);

        let decay_min = self.config.decay_min.max(f32::EPSILON);
        let decay_max = self.config.decay_max.max(decay_min);
        self.decay_rate = decay_min + self.rng.f32() * (decay_max - decay_min);
    }

    /// Advances the countdown by `elapsed`
    pub fn tick(&mut self, elapsed: Duration) {
        if !self.config.enabled {
            return;
        }
        self.remaining = (self.remaining - elapsed.as_secs_f32() * self.decay_rate).max(0.0);

        if self.has_led && self.remaining <= 0.0 {
            debug!("leader epoch closed by nobody, leading again");
            self.has_led = false;
        }
    }

    /// Whether queued actions may be issued now. A `true` result starts
    /// this node's leadership; the caller must broadcast `LeaderNotify`.
    pub fn try_lead(&mut self) -> bool {
        if !self.config.enabled {
            return true;
        }
        if self.remaining > 0.0 || self.has_led {
            return false;
        }
        self.has_led = true;
        self.arm();
        true
    }

    /// Another node led: start a new epoch
    pub fn on_notify(&mut self) {
        if !self.config.enabled {
            return;
        }
        self.has_led = false;
        self.arm();
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn has_led(&self) -> bool {
        self.has_led
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }
}
