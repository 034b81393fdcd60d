use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use shared_models::error::AppError;

struct WindowState {
    window_start: DateTime<Utc>,
    count: u32,
}

/// Fixed-window counter keyed by source address. One instance guards
/// registration (every attempt counts), another guards login (only failed
/// attempts count; a success clears the key). State is in-process; a
/// replicated deployment moves these counters into the store.
#[derive(Clone)]
pub struct RateGuard {
    windows: Arc<RwLock<HashMap<String, WindowState>>>,
    limit: u32,
    window: Duration,
}

impl RateGuard {
    /// Registration guard: 5 attempts per hour per source address.
    pub fn registration() -> Self {
        Self::with_limits(5, Duration::hours(1))
    }

    /// Login guard: 5 failed attempts per 15 minutes per source address.
    pub fn login() -> Self {
        Self::with_limits(5, Duration::minutes(15))
    }

    pub fn with_limits(limit: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            limit,
            window,
        }
    }

    /// Count an attempt against the window. Registration calls this on every
    /// request.
    pub async fn check_and_count(&self, key: &str) -> Result<(), AppError> {
        let now = Utc::now();
        let mut windows = self.windows.write().await;

        let state = windows.entry(key.to_string()).or_insert(WindowState {
            window_start: now,
            count: 0,
        });

        if now - state.window_start >= self.window {
            state.window_start = now;
            state.count = 0;
        }

        if state.count >= self.limit {
            let retry_after = self.remaining_seconds(state, now);
            warn!(key = %key, "Rate limit exceeded");
            return Err(AppError::RateLimited { retry_after });
        }

        state.count += 1;
        Ok(())
    }

    /// Check without counting. Login calls this before attempting
    /// credentials; only `record_failure` advances the counter.
    pub async fn check(&self, key: &str) -> Result<(), AppError> {
        let now = Utc::now();
        let windows = self.windows.read().await;

        if let Some(state) = windows.get(key) {
            if now - state.window_start < self.window && state.count >= self.limit {
                let retry_after = self.remaining_seconds(state, now);
                warn!(key = %key, "Rate limit exceeded");
                return Err(AppError::RateLimited { retry_after });
            }
        }

        Ok(())
    }

    pub async fn record_failure(&self, key: &str) {
        let now = Utc::now();
        let mut windows = self.windows.write().await;

        let state = windows.entry(key.to_string()).or_insert(WindowState {
            window_start: now,
            count: 0,
        });

        if now - state.window_start >= self.window {
            state.window_start = now;
            state.count = 0;
        }

        state.count += 1;
    }

    pub async fn record_success(&self, key: &str) {
        let mut windows = self.windows.write().await;
        windows.remove(key);
    }

    fn remaining_seconds(&self, state: &WindowState, now: DateTime<Utc>) -> u64 {
        let elapsed = now - state.window_start;
        (self.window - elapsed).num_seconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn registration_guard_blocks_sixth_attempt() {
        let guard = RateGuard::registration();
        for _ in 0..5 {
            guard.check_and_count("10.0.0.1").await.unwrap();
        }
        let err = guard.check_and_count("10.0.0.1").await.unwrap_err();
        assert_matches!(err, AppError::RateLimited { retry_after } if retry_after > 0);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let guard = RateGuard::registration();
        for _ in 0..5 {
            guard.check_and_count("10.0.0.1").await.unwrap();
        }
        guard.check_and_count("10.0.0.2").await.unwrap();
    }

    #[tokio::test]
    async fn login_guard_only_counts_failures() {
        let guard = RateGuard::login();
        for _ in 0..10 {
            guard.check("10.0.0.1").await.unwrap();
        }
        for _ in 0..5 {
            guard.record_failure("10.0.0.1").await;
        }
        assert_matches!(
            guard.check("10.0.0.1").await,
            Err(AppError::RateLimited { .. })
        );
    }

    #[tokio::test]
    async fn success_resets_login_window() {
        let guard = RateGuard::login();
        for _ in 0..5 {
            guard.record_failure("10.0.0.1").await;
        }
        assert_matches!(
            guard.check("10.0.0.1").await,
            Err(AppError::RateLimited { .. })
        );
        guard.record_success("10.0.0.1").await;
        guard.check("10.0.0.1").await.unwrap();
    }

    #[tokio::test]
    async fn expired_window_resets() {
        let guard = RateGuard::with_limits(2, Duration::seconds(0));
        guard.check_and_count("10.0.0.1").await.unwrap();
        guard.check_and_count("10.0.0.1").await.unwrap();
        // Window length zero: every call starts a fresh window.
        guard.check_and_count("10.0.0.1").await.unwrap();
    }
}
