//! Reconnect backoff policy.
//!
//! A pure function of attempt count to delay with a bounded attempt budget.
//! The connection manager consumes this; the policy itself performs no I/O
//! and holds no timers.

use std::time::Duration;

/// Deterministic exponential backoff with a bounded attempt budget.
///
/// `delay(attempt) = base * 2^(attempt - 1)` for attempts within the budget;
/// past the budget the caller must stop retrying and surface a terminal
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy with the given base delay and attempt budget.
    #[must_use]
    pub const fn new(base: Duration, max_attempts: u32) -> Self {
        Self { base, max_attempts }
    }

    /// The maximum number of automatic reconnection attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the given retry attempt (1-indexed).
    ///
    /// Returns `None` once the attempt budget is exhausted (or for the
    /// nonsensical attempt 0).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor))
    }
}

impl Default for ReconnectPolicy {
    /// 1000 ms base, 3 attempts.
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delays_double_per_attempt() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(1), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay(2), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay(3), Some(Duration::from_millis(4000)));
    }

    #[test]
    fn budget_exhaustion_returns_none() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(4), None);
        assert_eq!(policy.delay(100), None);
    }

    #[test]
    fn attempt_zero_is_rejected() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(0), None);
    }

    #[test]
    fn custom_base_and_budget() {
        let policy = ReconnectPolicy::new(Duration::from_millis(250), 5);
        assert_eq!(policy.delay(1), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay(5), Some(Duration::from_millis(4000)));
        assert_eq!(policy.delay(6), None);
        assert_eq!(policy.max_attempts(), 5);
    }

    #[test]
    fn large_attempts_saturate_instead_of_overflowing() {
        let policy = ReconnectPolicy::new(Duration::from_secs(u64::MAX / 2), 3);
        assert!(policy.delay(3).is_some());
    }
}
