use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use farmgate_state::{KeyKind, StateKey, StateStore};

use crate::config::RateLimitConfig;
use crate::error::ModerationError;

/// Fixed-window submission limits per submitter email.
///
/// Each window is a counter keyed by `(window length, email, window index)`
/// that expires with the window. A refused attempt is rolled back so it does
/// not consume quota.
pub struct SubmissionLimiter {
    state: Arc<dyn StateStore>,
    namespace: String,
    config: RateLimitConfig,
}

impl SubmissionLimiter {
    pub fn new(
        state: Arc<dyn StateStore>,
        namespace: impl Into<String>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            state,
            namespace: namespace.into(),
            config,
        }
    }

    /// Count one submission by `email` at `now`.
    ///
    /// Fails with [`ModerationError::RateLimited`] when any window is full.
    pub async fn check(&self, email: &str, now: DateTime<Utc>) -> Result<(), ModerationError> {
        if !self.config.enabled {
            return Ok(());
        }
        let email = normalize(email);
        let mut counted: Vec<(StateKey, Duration)> = Vec::new();

        for (window, limit) in self.config.windows() {
            let (key, window_secs, index) = self.window_key(&email, window, now);
            let count = self.state.increment(&key, 1, Some(window)).await?;
            counted.push((key, window));

            if count > i64::from(limit) {
                self.roll_back(&counted).await;
                let window_end = (index + 1) * window_secs;
                let retry_after = u64::try_from(window_end - now.timestamp())
                    .unwrap_or(1)
                    .max(1);
                warn!(window_secs, limit, retry_after, "submission rate limit reached");
                return Err(ModerationError::RateLimited {
                    retry_after_seconds: retry_after,
                });
            }
            debug!(window_secs, count, limit, "submission counted");
        }
        Ok(())
    }

    /// Give back a submission counted by [`check`](Self::check) at the same
    /// `now`, for attempts that failed after passing the limiter.
    pub async fn release(&self, email: &str, now: DateTime<Utc>) {
        if !self.config.enabled {
            return;
        }
        let email = normalize(email);
        let counted: Vec<(StateKey, Duration)> = self
            .config
            .windows()
            .into_iter()
            .map(|(window, _)| (self.window_key(&email, window, now).0, window))
            .collect();
        self.roll_back(&counted).await;
        debug!("submission quota released");
    }

    fn window_key(&self, email: &str, window: Duration, now: DateTime<Utc>) -> (StateKey, i64, i64) {
        let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        let index = now.timestamp().div_euclid(window_secs);
        let key = StateKey::new(
            self.namespace.as_str(),
            KeyKind::RateLimit,
            format!("{window_secs}:{email}:{index}"),
        );
        (key, window_secs, index)
    }

    async fn roll_back(&self, counted: &[(StateKey, Duration)]) {
        for (key, window) in counted {
            if let Err(e) = self.state.increment(key, -1, Some(*window)).await {
                warn!(error = %e, key = %key, "failed to roll back rate limit counter");
            }
        }
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmgate_state_memory::MemoryStateStore;

    fn limiter(per_hour: u32, per_day: u32) -> SubmissionLimiter {
        SubmissionLimiter::new(
            Arc::new(MemoryStateStore::new()),
            "test",
            RateLimitConfig {
                enabled: true,
                per_hour,
                per_day,
            },
        )
    }

    #[tokio::test]
    async fn allows_up_to_the_hourly_limit() {
        let limiter = limiter(3, 50);
        let now = Utc::now();
        for _ in 0..3 {
            limiter.check("ann@example.com", now).await.unwrap();
        }
        let err = limiter.check("ann@example.com", now).await.unwrap_err();
        match err {
            ModerationError::RateLimited {
                retry_after_seconds,
            } => assert!((1..=3600).contains(&retry_after_seconds)),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn limits_are_per_submitter_and_case_insensitive() {
        let limiter = limiter(1, 50);
        let now = Utc::now();
        limiter.check("Ann@Example.com", now).await.unwrap();
        assert!(limiter.check("ann@example.com", now).await.is_err());
        limiter.check("bob@example.com", now).await.unwrap();
    }

    #[tokio::test]
    async fn daily_limit_refuses_until_next_day() {
        let limiter = limiter(10, 2);
        let now = Utc::now();
        limiter.check("ann@example.com", now).await.unwrap();
        limiter.check("ann@example.com", now).await.unwrap();
        for _ in 0..5 {
            assert!(limiter.check("ann@example.com", now).await.is_err());
        }
        // The next day opens a fresh window.
        let tomorrow = now + chrono::Duration::days(1);
        limiter.check("ann@example.com", tomorrow).await.unwrap();
    }

    #[tokio::test]
    async fn released_submission_does_not_count() {
        let limiter = limiter(1, 50);
        let now = Utc::now();
        limiter.check("ann@example.com", now).await.unwrap();
        limiter.release(" ANN@example.com", now).await;
        limiter.check("ann@example.com", now).await.unwrap();
        assert!(limiter.check("ann@example.com", now).await.is_err());
    }

    #[tokio::test]
    async fn disabled_limiter_allows_everything() {
        let limiter = SubmissionLimiter::new(
            Arc::new(MemoryStateStore::new()),
            "test",
            RateLimitConfig {
                enabled: false,
                per_hour: 0,
                per_day: 0,
            },
        );
        limiter.check("ann@example.com", Utc::now()).await.unwrap();
    }
}
