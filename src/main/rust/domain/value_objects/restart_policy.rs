use std::time::Duration;

use crate::domain::errors::{DomainError, Result};

/// Exponential backoff configuration for automatic engine restarts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Result<Self> {
        if multiplier <= 1.0 {
            return Err(DomainError::InvalidBackoff(
                "multiplier must be > 1.0".to_string(),
            ));
        }
        if max_delay < initial_delay {
            return Err(DomainError::InvalidBackoff(
                "max delay cannot be less than initial delay".to_string(),
            ));
        }

        Ok(Self {
            initial_delay,
            max_delay,
            multiplier,
        })
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Delay before the given restart attempt (1-based), capped at the
    /// maximum delay.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = self.multiplier.powi(exponent as i32);
        let delay = Duration::from_secs_f64(self.initial_delay.as_secs_f64() * factor);
        delay.min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Bounded automatic restart policy for a failed pipeline.
///
/// Once the attempt cap is exhausted the pipeline stays `Failed` until
/// an explicit external restart request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestartPolicy {
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl RestartPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub fn allows_attempt(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.initial_delay(), Duration::from_secs(1));
        assert_eq!(policy.max_delay(), Duration::from_secs(30));
        assert_eq!(policy.multiplier(), 2.0);
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_caps_at_max() {
        let policy =
            BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(10), 2.0).unwrap();
        assert_eq!(policy.delay_for(10), Duration::from_secs(10));
        assert_eq!(policy.delay_for(32), Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_invalid_multiplier() {
        let result = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(30), 1.0);
        assert!(result.is_err());

        let result = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(30), 0.5);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_max_below_initial() {
        let result = BackoffPolicy::new(Duration::from_secs(10), Duration::from_secs(1), 2.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_restart_policy_caps_attempts() {
        let policy = RestartPolicy::new(3, BackoffPolicy::default());
        assert!(policy.allows_attempt(1));
        assert!(policy.allows_attempt(3));
        assert!(!policy.allows_attempt(4));
    }
}
