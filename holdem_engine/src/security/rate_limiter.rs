//! Per-user token bucket limiting how fast actions reach the tables.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::time::Instant;

use crate::game::entities::UserId;

/// Rate limit configuration for player actions
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Tokens refilled per second
    pub actions_per_sec: f64,

    /// Bucket capacity, i.e. the largest burst allowed
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            actions_per_sec: 5.0,
            burst: 10,
        }
    }
}

impl RateLimitConfig {
    /// Defaults overridden by `RATE_LIMIT_ACTIONS_PER_SEC` and
    /// `RATE_LIMIT_ACTION_BURST` when they parse.
    pub fn actions() -> Self {
        let defaults = Self::default();
        Self {
            actions_per_sec: std::env::var("RATE_LIMIT_ACTIONS_PER_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|rate: &f64| *rate > 0.0)
                .unwrap_or(defaults.actions_per_sec),
            burst: std::env::var("RATE_LIMIT_ACTION_BURST")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|burst: &u32| *burst > 0)
                .unwrap_or(defaults.burst),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket per user. Checked before anything is queued to a table,
/// so a rejected action never touches table state.
#[derive(Debug)]
pub struct ActionRateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<UserId, Bucket>>,
}

impl ActionRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn buckets(&self) -> MutexGuard<'_, HashMap<UserId, Bucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a token for `user_id` if one is available.
    pub fn allow(&self, user_id: UserId) -> bool {
        self.allow_at(user_id, Instant::now())
    }

    pub fn allow_at(&self, user_id: UserId, now: Instant) -> bool {
        let capacity = f64::from(self.config.burst);
        let mut buckets = self.buckets();
        let bucket = buckets.entry(user_id).or_insert(Bucket {
            tokens: capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.actions_per_sec).min(capacity);
        bucket.last_refill = now.max(bucket.last_refill);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops a user's bucket, e.g. when their session ends.
    pub fn forget(&self, user_id: UserId) {
        self.buckets().remove(&user_id);
    }

    /// Drops buckets idle for longer than `max_idle`. Returns how many
    /// were removed.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) <= max_idle);
        before - buckets.len()
    }

    pub fn tracked_users(&self) -> usize {
        self.buckets().len()
    }
}

impl Default for ActionRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.actions_per_sec, 5.0);
        assert_eq!(config.burst, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_reject() {
        let limiter = ActionRateLimiter::default();
        let now = Instant::now();
        for _ in 0..10 {
            assert!(limiter.allow_at(1, now));
        }
        assert!(!limiter.allow_at(1, now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_at_rate() {
        let limiter = ActionRateLimiter::default();
        let start = Instant::now();
        for _ in 0..10 {
            limiter.allow_at(1, start);
        }
        // 5 per second, so one token every 200ms.
        assert!(!limiter.allow_at(1, start + Duration::from_millis(100)));
        assert!(limiter.allow_at(1, start + Duration::from_millis(200)));
        assert!(!limiter.allow_at(1, start + Duration::from_millis(200)));

        let later = start + Duration::from_secs(60);
        for _ in 0..10 {
            assert!(limiter.allow_at(1, later));
        }
        assert!(!limiter.allow_at(1, later));
    }

    #[tokio::test(start_paused = true)]
    async fn test_users_are_independent() {
        let limiter = ActionRateLimiter::default();
        let now = Instant::now();
        for _ in 0..10 {
            limiter.allow_at(1, now);
        }
        assert!(!limiter.allow_at(1, now));
        assert!(limiter.allow_at(2, now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_and_prune() {
        let limiter = ActionRateLimiter::default();
        assert!(limiter.allow(1));
        assert!(limiter.allow(2));
        limiter.forget(1);
        assert_eq!(limiter.tracked_users(), 1);

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(limiter.allow(3));
        assert_eq!(limiter.prune_idle(Duration::from_secs(60)), 1);
        assert_eq!(limiter.tracked_users(), 1);
    }
}
