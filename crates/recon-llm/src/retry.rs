use crate::error::{LlmError, Result};
use std::future::Future;
use std::time::Duration;

/// How a single request attempt failed, from the retry loop's view.
#[derive(Debug)]
pub enum AttemptError {
    /// Provider-reported quota exhaustion (HTTP 429).
    RateLimited,
    /// Connection or timeout failure before a usable response.
    Transport(String),
    /// Anything that retrying will not fix.
    Fatal(LlmError),
}

/// Retry schedule shared by all providers.
///
/// Rate limits get `max_attempts` tries with exponential backoff; transport
/// errors get exactly one extra try. The base delay is injectable so tests
/// run without real sleeps.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, completed_attempts: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(completed_attempts.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    pub async fn run<F, Fut>(&self, mut attempt: F) -> Result<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<String, AttemptError>>,
    {
        let mut rate_limited = 0u32;
        let mut transport_retried = false;

        loop {
            match attempt().await {
                Ok(text) => return Ok(text),
                Err(AttemptError::RateLimited) => {
                    rate_limited += 1;
                    if rate_limited >= self.max_attempts {
                        return Err(LlmError::QuotaExhausted {
                            attempts: rate_limited,
                        });
                    }
                    let delay = self.backoff(rate_limited);
                    tracing::warn!(
                        attempt = rate_limited,
                        delay_ms = delay.as_millis() as u64,
                        "provider rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(AttemptError::Transport(reason)) => {
                    if transport_retried {
                        return Err(LlmError::UpstreamUnavailable(reason));
                    }
                    transport_retried = true;
                    tracing::warn!(%reason, "transport error, retrying once");
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            multiplier: 2,
        }
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_yields_quota_error() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AttemptError::RateLimited) }
            })
            .await;

        assert!(matches!(result, Err(LlmError::QuotaExhausted { attempts: 3 })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_recovers_within_budget() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AttemptError::RateLimited)
                    } else {
                        Ok("done".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn transport_error_retries_exactly_once() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AttemptError::Transport("connection reset".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(LlmError::UpstreamUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(AttemptError::Fatal(LlmError::InvalidResponse(
                        "bad json".to_string(),
                    )))
                }
            })
            .await;

        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }
}
