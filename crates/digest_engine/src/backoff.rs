use std::time::Duration;

/// Exponential reconnect delays: `base * 2^attempt`, at most `max_attempts`
/// reconnects between successful opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    pub const fn new(base: Duration, max_attempts: u32) -> Self {
        Self { base, max_attempts }
    }

    /// Policy for streams that must never reconnect on their own.
    pub const fn no_retry() -> Self {
        Self {
            base: Duration::ZERO,
            max_attempts: 0,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    After(Duration),
    GiveUp,
}

/// Attempt counter for one subscription. Reset on every successful open.
#[derive(Debug, Clone)]
pub struct ReconnectTracker {
    policy: BackoffPolicy,
    attempts: u32,
}

impl ReconnectTracker {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    pub fn on_failure(&mut self) -> Reconnect {
        if self.attempts >= self.policy.max_attempts {
            return Reconnect::GiveUp;
        }
        let delay = self.policy.delay_for(self.attempts);
        self.attempts += 1;
        Reconnect::After(delay)
    }
}
