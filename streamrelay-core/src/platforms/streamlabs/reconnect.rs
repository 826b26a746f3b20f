// File: streamrelay-core/src/platforms/streamlabs/reconnect.rs

use std::time::Duration;
use rand::Rng;

/// Transport-level reconnection schedule.
///
/// Defaults follow the Socket.IO client: 1s doubling up to 5s, +/-50% jitter,
/// retry forever.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// 0.0 disables jitter.
    pub randomization_factor: f64,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            randomization_factor: 0.5,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Fixed delay, no jitter. Handy for tests.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            enabled: true,
            initial_delay: delay,
            max_delay: delay,
            randomization_factor: 0.0,
            max_attempts: None,
        }
    }

    /// `attempt` is 1-based: the first reconnect after a drop is attempt 1.
    pub fn allows(&self, attempt: u32) -> bool {
        self.enabled && self.max_attempts.map_or(true, |max| attempt <= max)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut rng = rand::rng();
        let roll: f64 = rng.random();
        let add = rng.random_bool(0.5);
        self.jittered(attempt, roll, add)
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    fn jittered(&self, attempt: u32, roll: f64, add: bool) -> Duration {
        let base = self.base_delay(attempt);
        if self.randomization_factor <= 0.0 {
            return base;
        }
        let deviation = base.mul_f64((roll * self.randomization_factor).clamp(0.0, 1.0));
        let delay = if add {
            base.saturating_add(deviation)
        } else {
            base.saturating_sub(deviation)
        };
        delay.min(self.max_delay)
    }
}
