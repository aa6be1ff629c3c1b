//! Per-user sliding-window admission gate

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::debug;

/// Width of the sliding window
pub const WINDOW: Duration = Duration::from_secs(60);
/// Tracked-user count above which idle users are purged
pub const PURGE_THRESHOLD: usize = 1000;
/// Users idle longer than this are dropped by a purge
pub const STALE_AFTER: Duration = Duration::from_secs(300);

/// Sliding-window rate limiter keyed by user id
#[derive(Debug)]
pub struct RateLimiter {
    limit_per_minute: usize,
    history: Mutex<HashMap<i64, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: usize) -> Self {
        Self {
            limit_per_minute,
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit_per_minute(&self) -> usize {
        self.limit_per_minute
    }

    /// Admit or reject a request made now
    pub fn check(&self, user_id: i64) -> bool {
        self.check_at(user_id, Instant::now())
    }

    /// Admit or reject a request made at `now`
    pub fn check_at(&self, user_id: i64, now: Instant) -> bool {
        let mut history = self.history.lock();

        let stamps = history.entry(user_id).or_default();
        while stamps
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= WINDOW)
        {
            stamps.pop_front();
        }

        if stamps.len() >= self.limit_per_minute {
            debug!("User {} rate limited ({} in window)", user_id, stamps.len());
            return false;
        }
        stamps.push_back(now);

        if history.len() > PURGE_THRESHOLD {
            let before = history.len();
            history.retain(|_, stamps| {
                stamps
                    .back()
                    .is_some_and(|&t| now.saturating_duration_since(t) <= STALE_AFTER)
            });
            debug!("Purged {} idle users from rate limiter", before - history.len());
        }

        true
    }

    /// Number of users currently tracked
    pub fn tracked_users(&self) -> usize {
        self.history.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_then_recovery() {
        let limiter = RateLimiter::new(30);
        let t0 = Instant::now();

        for _ in 0..30 {
            assert!(limiter.check_at(7, t0));
        }
        assert!(!limiter.check_at(7, t0 + Duration::from_secs(59)));
        assert!(limiter.check_at(7, t0 + Duration::from_secs(61)));
    }

    #[test]
    fn test_users_do_not_share_windows() {
        let limiter = RateLimiter::new(1);
        let t0 = Instant::now();

        assert!(limiter.check_at(1, t0));
        assert!(!limiter.check_at(1, t0));
        assert!(limiter.check_at(2, t0));
    }

    #[test]
    fn test_idle_users_purged_past_threshold() {
        let limiter = RateLimiter::new(5);
        let t0 = Instant::now();

        for user in 0..PURGE_THRESHOLD as i64 {
            limiter.check_at(user, t0);
        }
        assert_eq!(limiter.tracked_users(), PURGE_THRESHOLD);

        let later = t0 + STALE_AFTER + Duration::from_secs(1);
        assert!(limiter.check_at(-1, later));
        assert_eq!(limiter.tracked_users(), 1);
    }
}
