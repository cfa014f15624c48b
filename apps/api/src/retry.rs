//! Bounded retry with exponential backoff.
//!
//! The delay source is injected through the `Sleeper` trait so retry
//! behavior is testable without real timers: tests pass a recording
//! sleeper and assert on the exact delay sequence.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

/// Injectable delay abstraction. Production code uses `TokioSleeper`;
/// tests use a recording stub.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Exponential backoff schedule: `base`, doubling per retry, capped at `cap`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_retries: u32,
}

impl BackoffPolicy {
    /// ATS rate-limit policy: 2s, 4s, 8s, 16s, 30s (capped), up to 5 retries.
    pub fn ats() -> Self {
        BackoffPolicy {
            base: Duration::from_secs(2),
            cap: Duration::from_secs(30),
            max_retries: 5,
        }
    }

    /// Delay before the `retry`-th retry (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(1u32 << shift);
        delay.min(self.cap)
    }
}

/// Runs `op` until it succeeds, the error is non-retryable, or the retry
/// budget is exhausted. The last error is returned on exhaustion.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: BackoffPolicy,
    sleeper: &dyn Sleeper,
    mut is_retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: FnMut(&E) -> bool,
    E: std::fmt::Display,
{
    let mut retries = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if retries >= policy.max_retries || !is_retryable(&e) {
                    return Err(e);
                }
                retries += 1;
                let delay = policy.delay(retries);
                warn!(
                    "retryable failure (retry {}/{}, waiting {}ms): {e}",
                    retries,
                    policy.max_retries,
                    delay.as_millis()
                );
                sleeper.sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Sleeper that records requested delays instead of waiting.
    #[derive(Default)]
    pub struct RecordingSleeper {
        pub delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingSleeper;
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_ats_delay_schedule_doubles_and_caps() {
        let policy = BackoffPolicy::ats();
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(4), Duration::from_secs(16));
        assert_eq!(policy.delay(5), Duration::from_secs(30)); // 32s capped at 30s
    }

    #[tokio::test]
    async fn test_two_failures_then_success_waits_2s_then_4s() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = retry_with_backoff(
            BackoffPolicy::ats(),
            &sleeper,
            |_e: &String| true,
            move || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err("429".to_string()),
                    _ => Ok(42u32),
                }
            },
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let delays = sleeper.delays.lock().unwrap();
        assert_eq!(*delays, vec![Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let sleeper = RecordingSleeper::default();
        let result: Result<(), String> = retry_with_backoff(
            BackoffPolicy {
                base: Duration::from_millis(1),
                cap: Duration::from_millis(10),
                max_retries: 2,
            },
            &sleeper,
            |_| true,
            || async { Err("always".to_string()) },
        )
        .await;

        assert_eq!(result, Err("always".to_string()));
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), String> = retry_with_backoff(
            BackoffPolicy::ats(),
            &sleeper,
            |e: &String| e == "429",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("404".to_string())
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }
}
