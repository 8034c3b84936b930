//! Retry pacing for automatic sync cycles.
//!
//! After a cycle fails to reach the server, timer ticks are skipped until
//! an exponentially growing delay has passed. Manual triggers and online
//! transitions are never delayed.

use std::time::{Duration, Instant};

/// Initial delay after the first failed cycle.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on the delay between automatic attempts.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// Calculate exponential backoff delay.
///
/// `base * 2^(failures - 1)`, capped at `max`. Zero failures means no delay.
#[must_use]
pub fn calculate_backoff(consecutive_failures: u32, base: Duration, max: Duration) -> Duration {
    if consecutive_failures == 0 {
        return Duration::ZERO;
    }
    let multiplier = 2u32.saturating_pow(consecutive_failures - 1);
    base.saturating_mul(multiplier).min(max)
}

/// Consecutive-failure counter with the next permitted attempt time.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
    next_attempt: Option<Instant>,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
            next_attempt: None,
        }
    }

    /// Record a failed cycle and push the next attempt out.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = calculate_backoff(self.failures, self.base, self.max);
        self.next_attempt = Some(Instant::now() + delay);
        delay
    }

    /// Clear after a cycle that reached the server.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.next_attempt = None;
    }

    /// Whether an automatic attempt is allowed at `now`.
    #[must_use]
    pub fn is_ready(&self, now: Instant) -> bool {
        self.next_attempt.is_none_or(|at| now >= at)
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_backoff_doubles_and_caps() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(300);

        assert_eq!(calculate_backoff(0, base, max), Duration::ZERO);
        assert_eq!(calculate_backoff(1, base, max), Duration::from_secs(1));
        assert_eq!(calculate_backoff(2, base, max), Duration::from_secs(2));
        assert_eq!(calculate_backoff(4, base, max), Duration::from_secs(8));
        assert_eq!(calculate_backoff(9, base, max), Duration::from_secs(256));
        assert_eq!(calculate_backoff(10, base, max), max);
        assert_eq!(calculate_backoff(64, base, max), max);
    }

    #[test]
    fn test_backoff_gates_until_reset() {
        let mut backoff = Backoff::new(Duration::from_secs(60), Duration::from_secs(600));
        let now = Instant::now();
        assert!(backoff.is_ready(now));

        backoff.record_failure();
        assert_eq!(backoff.failures(), 1);
        assert!(!backoff.is_ready(now));
        assert!(backoff.is_ready(now + Duration::from_secs(61)));

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert!(backoff.is_ready(now));
    }
}
