// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared exponential-backoff-with-jitter parameters.
//!
//! Factored out of the per-call retry loops in `bk-controlplane` and
//! `bk-logstreamer` since both `StartJob`/`FinishJob` and
//! `UploadChunk` describe the same backoff shape.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// `None` means retry for [`RetryPolicy::max_elapsed`] instead of a
    /// fixed attempt count (used by `finishJob`'s "retry for at least ~1
    /// hour" contract).
    pub max_attempts: Option<u32>,
    pub max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    /// Bounded-attempt policy, e.g. for `startJob`.
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: Some(max_attempts),
            max_elapsed: None,
        }
    }

    /// Time-bounded policy, e.g. for `finishJob`'s ~1 hour retry window.
    pub fn time_bounded(max_elapsed: Duration) -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            max_attempts: None,
            max_elapsed: Some(max_elapsed),
        }
    }

    /// The delay before the `attempt`-th retry (1-indexed), with full
    /// jitter: a uniformly random duration in `[0, min(max_delay, base *
    /// 2^(attempt-1)))`. `jitter_fraction` is a caller-supplied value in
    /// `[0.0, 1.0)` (usually from an RNG) so this stays deterministic to
    /// test without depending on a random source here.
    pub fn delay_for_attempt(&self, attempt: u32, jitter_fraction: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let scaled = self.base_delay.as_millis().saturating_mul(1u128 << exponent);
        let capped = scaled.min(self.max_delay.as_millis());
        let jittered = (capped as f64 * jitter_fraction.clamp(0.0, 0.999_999)) as u64;
        Duration::from_millis(jittered)
    }

    pub fn should_retry(&self, attempt: u32, elapsed: Duration) -> bool {
        if let Some(max_attempts) = self.max_attempts {
            if attempt >= max_attempts {
                return false;
            }
        }
        if let Some(max_elapsed) = self.max_elapsed {
            if elapsed >= max_elapsed {
                return false;
            }
        }
        true
    }

    /// Honour a server-provided `Retry-After` hint when present, else fall
    /// back to the computed backoff delay.
    pub fn delay_honouring_retry_after(
        &self,
        attempt: u32,
        jitter_fraction: f64,
        retry_after: Option<Duration>,
    ) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt, jitter_fraction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_with_attempt() {
        let policy = RetryPolicy::bounded(10);
        let d1 = policy.delay_for_attempt(1, 0.999);
        let d2 = policy.delay_for_attempt(2, 0.999);
        let d3 = policy.delay_for_attempt(3, 0.999);
        assert!(d1 < d2);
        assert!(d2 < d3);
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let policy = RetryPolicy::bounded(50);
        let huge = policy.delay_for_attempt(40, 0.999999);
        assert!(huge <= policy.max_delay);
    }

    #[test]
    fn bounded_policy_stops_at_max_attempts() {
        let policy = RetryPolicy::bounded(3);
        assert!(policy.should_retry(0, Duration::ZERO));
        assert!(policy.should_retry(2, Duration::ZERO));
        assert!(!policy.should_retry(3, Duration::ZERO));
    }

    #[test]
    fn time_bounded_policy_stops_after_max_elapsed() {
        let policy = RetryPolicy::time_bounded(Duration::from_secs(3600));
        assert!(policy.should_retry(1000, Duration::from_secs(3599)));
        assert!(!policy.should_retry(1000, Duration::from_secs(3600)));
    }

    #[test]
    fn retry_after_hint_overrides_computed_backoff() {
        let policy = RetryPolicy::bounded(5);
        let delay = policy.delay_honouring_retry_after(1, 0.5, Some(Duration::from_secs(42)));
        assert_eq!(delay, Duration::from_secs(42));
    }
}
