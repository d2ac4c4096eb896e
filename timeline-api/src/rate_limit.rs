//! Fixed window admission control keyed by client identity.
//!
//! Windows are created on a client's first request and reset lazily on the
//! first request after they expire. They are never evicted.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's window resets.
    pub reset_in: Duration,
}

struct RateWindow {
    count: u32,
    reset_at: Instant,
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        RateLimiter {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, identity: &str) -> RateLimitDecision {
        self.check_at(identity, Instant::now())
    }

    pub fn check_at(&self, identity: &str, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock();

        let window = windows
            .entry(identity.to_string())
            .or_insert(RateWindow {
                count: 0,
                reset_at: now,
            });
        if now >= window.reset_at {
            window.count = 0;
            window.reset_at = now + self.window;
        }

        let reset_in = window.reset_at.saturating_duration_since(now);
        if window.count >= self.max_requests {
            return RateLimitDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_in,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - window.count,
            reset_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_allows_exactly_max_per_window() {
        let limiter = RateLimiter::new(3, WINDOW);
        let start = Instant::now();

        let remaining: Vec<u32> = (0..3)
            .map(|i| {
                let decision = limiter.check_at("1.2.3.4", start + Duration::from_secs(i));
                assert!(decision.allowed);
                decision.remaining
            })
            .collect();
        assert_eq!(remaining, [2, 1, 0]);

        let denied = limiter.check_at("1.2.3.4", start + Duration::from_secs(10));
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_in, Duration::from_secs(50));

        // Denials do not extend the window.
        let after_reset = limiter.check_at("1.2.3.4", start + denied.reset_in + Duration::from_secs(10));
        assert!(after_reset.allowed);
        assert_eq!(after_reset.remaining, 2);
        assert_eq!(after_reset.reset_in, WINDOW);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1, WINDOW);
        let now = Instant::now();

        assert!(limiter.check_at("a", now).allowed);
        assert!(!limiter.check_at("a", now).allowed);
        assert!(limiter.check_at("b", now).allowed);
        assert!(limiter.check_at("unknown", now).allowed);
    }

    #[test]
    fn test_window_resets_exactly_at_boundary() {
        let limiter = RateLimiter::new(1, WINDOW);
        let start = Instant::now();

        assert!(limiter.check_at("a", start).allowed);
        assert!(!limiter.check_at("a", start + WINDOW - Duration::from_millis(1)).allowed);
        assert!(limiter.check_at("a", start + WINDOW).allowed);
    }
}
