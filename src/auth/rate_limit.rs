//! Sliding-window request limiter keyed by client identity.

use crate::auth::AuthError;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Default maximum number of requests per window.
pub const DEFAULT_LIMIT: usize = 5;

/// Default window length (1 minute).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Admits at most `limit` requests per key within any `window`-long interval.
///
/// Rejected attempts are not recorded, so a client hammering the endpoint is
/// admitted again as soon as its oldest admitted request leaves the window.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    /// Prune, decide and record in one critical section.
    pub fn admit_at(&self, key: &str, now: Instant) -> bool {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);

        let timestamps = requests.entry(key.to_string()).or_default();
        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.limit {
            warn!("rate limit exceeded for {}", key);
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// # Errors
    ///
    /// Returns [`AuthError::RateLimited`] when the request is not admitted.
    pub fn check(&self, key: &str) -> Result<(), AuthError> {
        if self.admit(key) {
            Ok(())
        } else {
            Err(AuthError::RateLimited)
        }
    }

    /// Drop keys with no request inside the window. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        let before = requests.len();

        requests.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|&newest| now.saturating_duration_since(newest) < self.window)
        });

        let removed = before - requests.len();
        if removed > 0 {
            debug!("rate limiter swept {} idle keys", removed);
        }
        removed
    }

    /// Number of keys currently held.
    pub fn tracked_keys(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn policy_is_fixed_at_construction() {
        let limiter = RateLimiter::new(10, secs(30));
        assert_eq!((limiter.limit(), limiter.window()), (10, secs(30)));

        let defaults = RateLimiter::default();
        assert_eq!((defaults.limit(), defaults.window()), (DEFAULT_LIMIT, DEFAULT_WINDOW));
    }

    #[test]
    fn admits_up_to_limit_then_slides() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();

        for i in 0..5 {
            assert!(limiter.admit_at("1.2.3.4", t0 + secs(i)), "request {i}");
        }
        assert!(!limiter.admit_at("1.2.3.4", t0 + secs(5)));
        // first request at t0 has left the window
        assert!(limiter.admit_at("1.2.3.4", t0 + secs(61)));
    }

    #[test]
    fn rejected_attempts_are_not_recorded() {
        let limiter = RateLimiter::new(2, secs(10));
        let t0 = Instant::now();

        assert!(limiter.admit_at("k", t0));
        assert!(limiter.admit_at("k", t0 + secs(1)));
        for i in 2..9 {
            assert!(!limiter.admit_at("k", t0 + secs(i)));
        }
        assert!(limiter.admit_at("k", t0 + secs(10)));
        assert!(!limiter.admit_at("k", t0 + secs(10)));
        assert!(limiter.admit_at("k", t0 + secs(11)));
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let limiter = RateLimiter::new(1, secs(60));
        let t0 = Instant::now();

        assert!(limiter.admit_at("k", t0));
        assert!(!limiter.admit_at("k", t0 + Duration::from_millis(59_999)));
        assert!(limiter.admit_at("k", t0 + secs(60)));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, secs(60));
        let t0 = Instant::now();

        assert!(limiter.admit_at("a", t0));
        assert!(!limiter.admit_at("a", t0));
        assert!(limiter.admit_at("b", t0));
        assert_eq!(limiter.check("a"), Err(AuthError::RateLimited));
    }

    #[test]
    fn zero_limit_rejects_everything() {
        let limiter = RateLimiter::new(0, secs(60));
        assert!(!limiter.admit("k"));
    }

    #[test]
    fn sweep_removes_only_idle_keys() {
        let limiter = RateLimiter::new(5, secs(60));
        let t0 = Instant::now();

        assert!(limiter.admit_at("old", t0));
        assert!(limiter.admit_at("fresh", t0 + secs(30)));
        assert_eq!(limiter.tracked_keys(), 2);

        assert_eq!(limiter.sweep_at(t0 + secs(61)), 1);
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(limiter.admit_at("fresh", t0 + secs(62)));
    }

    #[test]
    fn concurrent_callers_never_overshoot() {
        let limiter = Arc::new(RateLimiter::new(5, secs(60)));
        let workers = 32;
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    limiter.admit("10.0.0.1")
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 5);
    }
}
