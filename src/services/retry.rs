//! Bounded retry with exponential backoff for transient browser failures.

use std::time::Duration;

use tracing::warn;

use crate::browser::{BrowserError, BrowserSession, FetchedBytes, Navigation};

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each following one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Sleep before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    fn should_retry(&self, err: &BrowserError, attempt: u32) -> bool {
        err.is_transient() && attempt < self.max_retries
    }

    /// `session.navigate` with retries.
    pub async fn navigate(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        timeout: Duration,
    ) -> Result<Navigation, BrowserError> {
        let mut attempt = 0;
        loop {
            match session.navigate(url, timeout).await {
                Ok(nav) => return Ok(nav),
                Err(e) if self.should_retry(&e, attempt) => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(
                        "Navigation to {} failed ({}), retry {}/{} in {:?}",
                        url, e, attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `session.fetch_bytes` with retries.
    pub async fn fetch_bytes(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        timeout: Duration,
    ) -> Result<FetchedBytes, BrowserError> {
        let mut attempt = 0;
        loop {
            match session.fetch_bytes(url, timeout).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if self.should_retry(&e, attempt) => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(
                        "Fetch of {} failed ({}), retry {}/{} in {:?}",
                        url, e, attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Fails navigation with the queued errors, then succeeds.
    struct Flaky {
        failures: Vec<BrowserError>,
        calls: usize,
    }

    #[async_trait]
    impl BrowserSession for Flaky {
        async fn navigate(&mut self, url: &str, _t: Duration) -> Result<Navigation, BrowserError> {
            self.calls += 1;
            if self.failures.is_empty() {
                Ok(Navigation {
                    url: url.to_string(),
                    status: Some(200),
                })
            } else {
                Err(self.failures.remove(0))
            }
        }
        async fn current_url(&mut self) -> Result<String, BrowserError> {
            Ok(String::new())
        }
        async fn content(&mut self) -> Result<String, BrowserError> {
            Ok(String::new())
        }
        async fn evaluate(&mut self, _s: &str) -> Result<serde_json::Value, BrowserError> {
            Ok(serde_json::Value::Null)
        }
        async fn click(&mut self, _s: &str, _i: usize) -> Result<(), BrowserError> {
            Ok(())
        }
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(20), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let mut session = Flaky {
            failures: vec![
                BrowserError::Timeout(Duration::from_secs(1)),
                BrowserError::Network("reset".into()),
            ],
            calls: 0,
        };
        let nav = fast(3)
            .navigate(&mut session, "https://x/a", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(nav.status, Some(200));
        assert_eq!(session.calls, 3);
    }

    #[tokio::test]
    async fn test_budget_is_bounded() {
        let mut session = Flaky {
            failures: (0..10)
                .map(|_| BrowserError::Timeout(Duration::from_secs(1)))
                .collect(),
            calls: 0,
        };
        let err = fast(2)
            .navigate(&mut session, "https://x/a", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Timeout(_)));
        assert_eq!(session.calls, 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_fail_immediately() {
        let mut session = Flaky {
            failures: vec![BrowserError::Navigation {
                url: "https://x/a".into(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            }],
            calls: 0,
        };
        assert!(fast(3)
            .navigate(&mut session, "https://x/a", Duration::from_secs(1))
            .await
            .is_err());
        assert_eq!(session.calls, 1);
    }
}
