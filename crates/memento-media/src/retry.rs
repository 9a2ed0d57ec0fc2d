//! Backoff between failed load attempts.
//!
//! The delay before retry `n` (0-indexed) is `first × factor^n`, clamped to
//! `max`, with optional jitter applied to the clamped value. Jitter never
//! feeds back into later delays.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Randomization applied to backoff delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterPolicy {
    /// Exact delays.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// `delay / 2` plus uniform in `[0, delay / 2]`.
    Equal,
}

impl JitterPolicy {
    /// Apply jitter to `delay`.
    pub fn apply(self, delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        match self {
            Self::None => delay,
            Self::Full => Duration::from_millis(rng.gen_range(0..=ms)),
            Self::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rng.gen_range(0..=half))
            }
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Growth factor per retry.
    pub factor: f64,
    pub jitter: JitterPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(4),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl RetryPolicy {
    /// No delay between attempts.
    pub fn immediate() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay(&self, retry: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = retry.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(4), Duration::from_secs(4));
    }

    #[test]
    fn huge_retry_clamps_to_max() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(4));
    }

    #[test]
    fn immediate_is_zero() {
        assert_eq!(RetryPolicy::immediate().delay(3), Duration::ZERO);
    }

    #[test]
    fn equal_jitter_bounds() {
        let policy = RetryPolicy {
            jitter: JitterPolicy::Equal,
            ..RetryPolicy::default()
        };
        for retry in 0..20 {
            let delay = policy.delay(retry);
            let base = RetryPolicy::default().delay(retry);
            assert!(delay >= base / 2, "retry {retry}: {delay:?} below half of {base:?}");
            assert!(delay <= base, "retry {retry}: {delay:?} above {base:?}");
        }
    }

    #[test]
    fn full_jitter_never_exceeds_base() {
        let policy = RetryPolicy {
            jitter: JitterPolicy::Full,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            assert!(policy.delay(1) <= Duration::from_secs(1));
        }
    }
}
