use std::time::Duration;

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_STEP_MS: u64 = 2_000;
const RECONNECT_MAX_MS: u64 = 10_000;

/// `min(2000 ms × attempt, 10000 ms)`.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let ms = RECONNECT_STEP_MS
        .saturating_mul(u64::from(attempt))
        .min(RECONNECT_MAX_MS);
    Duration::from_millis(ms)
}

/// Bounded reconnect bookkeeping for the Live connection.
#[derive(Debug, Default, Clone)]
pub struct ReconnectPolicy {
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next attempt; `None` once the budget is spent.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        if self.attempts >= MAX_RECONNECT_ATTEMPTS {
            return None;
        }
        self.attempts += 1;
        Some((self.attempts, reconnect_delay(self.attempts)))
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
