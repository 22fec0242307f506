// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry wrapper around a [`ControlPlane`](crate::ControlPlane) call
//!: exponential backoff with jitter, honouring
//! server-provided retry-after hints, stopping at a terminal error.

use std::future::Future;
use std::time::{Duration, Instant};

use bk_core::{ControlPlaneError, RetryPolicy};
use tracing::warn;

/// Run `op` under `policy` until it succeeds, the error is non-retryable,
/// or the policy's attempt/elapsed bound is reached. `jitter` supplies the
/// `[0, 1)` fraction for each backoff delay (kept as an injected closure so
/// the backoff curve stays unit-testable without a real RNG).
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut jitter: impl FnMut() -> f64,
    mut op: F,
) -> Result<T, ControlPlaneError>
where
F: FnMut() -> Fut,
Fut: Future<Output = Result<T, ControlPlaneError>>,
{
    let start = Instant::now();
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_terminal() => return Err(err),
            Err(err) => {
                let elapsed = start.elapsed();
                if !policy.should_retry(attempt, elapsed) {
                    return Err(ControlPlaneError::RetryExhausted { attempts: attempt + 1 });
                }
                let retry_after = match &err {
                    ControlPlaneError::Http { retry_after, .. } => *retry_after,
                    _ => None,
                };
                let delay = policy.delay_honouring_retry_after(attempt + 1, jitter(), retry_after);
                warn!(attempt, ?delay, error = %err, "control-plane call failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// `startJob`'s policy: bounded attempts, any final
/// failure is fatal to the job.
pub fn start_job_policy() -> RetryPolicy {
    RetryPolicy::bounded(8)
}

/// `finishJob`'s policy: retry for at least ~1 hour.
pub fn finish_job_policy() -> RetryPolicy {
    RetryPolicy::time_bounded(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retrying_when_the_first_call_succeeds() {
        let policy = start_job_policy();
        let calls = AtomicU32::new(0);
        let result: Result<(), ControlPlaneError> = with_retry(&policy, || 0.0, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let policy = RetryPolicy::bounded(5);
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy, || 0.0, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ControlPlaneError::Transport("connection reset".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn a_non_retryable_error_returns_immediately() {
        let policy = start_job_policy();
        let calls = AtomicU32::new(0);
        let result: Result<(), ControlPlaneError> = with_retry(&policy, || 0.0, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ControlPlaneError::Http { status: 422, body: String::new(), retry_after: None })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_the_attempt_budget_surfaces_retry_exhausted() {
        let policy = RetryPolicy::bounded(2);
        let result: Result<(), ControlPlaneError> = with_retry(&policy, || 0.0, || async {
            Err(ControlPlaneError::Transport("down".into()))
        })
        .await;
        assert!(matches!(result, Err(ControlPlaneError::RetryExhausted { .. })));
    }
}
