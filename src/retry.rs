//! Bounded retry with exponential backoff and full jitter.
//!
//! The handler itself never retries. This is the orchestrator side of the
//! contract: re-run a whole unit of work only when its error reports
//! [`IdpError::is_retryable`].
//!
//! The delay before attempt `n + 1` is drawn uniformly from
//! `[0, min(max_delay, base_delay * 2^(n - 1))]`. A rate-limit answer that
//! names a `Retry-After` raises the delay to at least that long.

use crate::error::{IdpError, InferenceError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How many times to run a unit of work and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. Default: 3.
    pub max_attempts: u32,
    /// Backoff ceiling for the first retry. Default: 500 ms.
    pub base_delay_ms: u64,
    /// Upper bound on any single backoff ceiling. Default: 20 s.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 20_000,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff ceiling after `attempt` failed attempts (1-based).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Jittered delay after `attempt` failed attempts.
    pub fn delay(&self, attempt: u32, err: &IdpError) -> Duration {
        let ceiling = self.ceiling(attempt).as_millis() as u64;
        let jittered = Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling));
        match err {
            IdpError::Inference(InferenceError::RateLimited {
                retry_after_secs: Some(secs),
            }) => jittered.max(Duration::from_secs(*secs)),
            _ => jittered,
        }
    }
}

/// Run `op` until it succeeds, fails terminally, or attempts run out.
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, IdpError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, IdpError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay(attempt, &e);
                warn!(
                    "Attempt {}/{} failed ({}); retrying in {}ms",
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> IdpError {
        IdpError::from(InferenceError::Service {
            status: Some(503),
            message: "busy".into(),
        })
    }

    #[test]
    fn ceiling_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.ceiling(1), Duration::from_millis(500));
        assert_eq!(p.ceiling(2), Duration::from_millis(1000));
        assert_eq!(p.ceiling(3), Duration::from_millis(2000));
        assert_eq!(p.ceiling(10), Duration::from_millis(20_000));
        assert_eq!(p.ceiling(u32::MAX), Duration::from_millis(20_000));
    }

    #[test]
    fn jitter_stays_under_ceiling() {
        let p = RetryPolicy::default();
        for attempt in 1..6 {
            for _ in 0..50 {
                assert!(p.delay(attempt, &transient()) <= p.ceiling(attempt));
            }
        }
    }

    #[test]
    fn retry_after_is_a_floor() {
        let p = RetryPolicy::default();
        let err = IdpError::from(InferenceError::RateLimited {
            retry_after_secs: Some(30),
        });
        assert!(p.delay(1, &err) >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let out = retry(&RetryPolicy::default(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(transient())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = retry(&RetryPolicy::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(transient()) }
        })
        .await
        .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry(&RetryPolicy::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(IdpError::MalformedResponse {
                    detail: "not json".into(),
                })
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, IdpError::MalformedResponse { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn none_policy_runs_once() {
        let calls = AtomicU32::new(0);
        let _ = retry(&RetryPolicy::none(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(transient()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
