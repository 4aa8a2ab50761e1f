//! Retry policy for chat delivery

use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Bounded exponential backoff, no jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based): `initial * 2^(attempt-1)`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }

    /// Whether another attempt follows a failure of `attempt`
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Every wait the policy can incur, in order
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.backoff_for(a)).collect()
    }

    /// Sum of all waits when every attempt fails
    pub fn worst_case_wait(&self) -> Duration {
        self.schedule().into_iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.schedule(),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(8000),
            ]
        );
        assert_eq!(policy.worst_case_wait(), Duration::from_secs(15));
    }

    #[test]
    fn test_should_retry_stops_at_ceiling() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy {
            max_attempts: 100,
            initial_backoff: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff_for(64), Duration::from_secs(u64::from(u32::MAX)));
    }

    #[test]
    fn test_single_attempt_policy_never_waits() {
        let policy = RetryPolicy {
            max_attempts: 1,
            initial_backoff: Duration::from_secs(1),
        };
        assert!(policy.schedule().is_empty());
        assert!(!policy.should_retry(1));
    }
}
