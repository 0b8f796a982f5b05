//! Per-client fixed-window rate limiting.
//!
//! A [`RateLimiter`] counts requests per client key. The first request from a
//! key opens a window; once the window has elapsed, the next request resets
//! it. Bursts of up to twice the quota are therefore possible across a window
//! boundary.
//!
//! Every decision for a key runs while holding that key's map entry, so two
//! concurrent requests can never both observe spare quota and both be
//! admitted past the limit. [`RateLimiter::sweep`] drops stale keys and is
//! run periodically by the task returned from [`RateLimiter::spawn_sweeper`].

pub mod sweeper;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::QuotaExceeded;

pub use sweeper::SweeperHandle;

/// Request accounting for one client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visitor {
    /// Requests admitted in the current window.
    pub count: u32,
    pub window_start: Instant,
    /// Time of the most recent request, admitted or not.
    pub last_seen: Instant,
}

impl Visitor {
    fn first(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
            last_seen: now,
        }
    }
}

pub struct RateLimiter {
    visitors: DashMap<String, Visitor>,
    rate_limit: u32,
    window: Duration,
}

impl RateLimiter {
    /// Creates a limiter admitting `rate_limit` requests per key per `window`.
    pub fn new(rate_limit: u32, window: Duration) -> Self {
        Self {
            visitors: DashMap::new(),
            rate_limit,
            window,
        }
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decides whether a request from `key` arriving at `now` is admitted.
    pub fn admit(&self, key: &str, now: Instant) -> bool {
        self.check(key, now).is_ok()
    }

    /// Like [`admit`](Self::admit), but a rejection says how long until the
    /// key's window ends.
    pub fn check(&self, key: &str, now: Instant) -> Result<(), QuotaExceeded> {
        let mut occupied = match self.visitors.entry(key.to_owned()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Visitor::first(now));
                return Ok(());
            }
            Entry::Occupied(occupied) => occupied,
        };

        let visitor = occupied.get_mut();
        visitor.last_seen = now;

        let elapsed = now.saturating_duration_since(visitor.window_start);
        if elapsed > self.window {
            visitor.count = 1;
            visitor.window_start = now;
            return Ok(());
        }

        if visitor.count >= self.rate_limit {
            tracing::debug!(
                key,
                count = visitor.count,
                limit = self.rate_limit,
                "rate limit exceeded"
            );
            return Err(QuotaExceeded {
                retry_after: self.window - elapsed,
            });
        }

        visitor.count += 1;
        Ok(())
    }

    /// Removes every visitor not seen for longer than the window and returns
    /// how many were removed.
    ///
    /// Shards are locked one at a time, so concurrent `admit` calls only ever
    /// wait for a single shard.
    pub fn sweep(&self, now: Instant) -> usize {
        let window = self.window;
        let mut removed = 0;
        self.visitors.retain(|_, visitor| {
            let fresh = now.saturating_duration_since(visitor.last_seen) <= window;
            if !fresh {
                removed += 1;
            }
            fresh
        });
        removed
    }

    /// Starts a background task that calls [`sweep`](Self::sweep) every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> SweeperHandle {
        sweeper::spawn(Arc::clone(self), period)
    }

    /// Snapshot of the record for `key`.
    pub fn visitor(&self, key: &str) -> Option<Visitor> {
        self.visitors.get(key).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.visitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visitors.is_empty()
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate_limit", &self.rate_limit)
            .field("window", &self.window)
            .field("visitors", &self.visitors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn first_request_creates_visitor() {
        let limiter = RateLimiter::new(3, WINDOW);
        let now = Instant::now();

        assert!(limiter.admit("10.0.0.1", now));

        let visitor = limiter.visitor("10.0.0.1").unwrap();
        assert_eq!(visitor.count, 1);
        assert_eq!(visitor.window_start, now);
    }

    #[test]
    fn admits_quota_then_rejects() {
        let limiter = RateLimiter::new(5, WINDOW);
        let start = Instant::now();

        for i in 0..5 {
            assert!(limiter.admit("k", start + Duration::from_secs(i)), "request {i}");
        }
        assert!(!limiter.admit("k", start + Duration::from_secs(10)));
        assert!(!limiter.admit("k", start + WINDOW));
    }

    #[test]
    fn rejection_does_not_increment() {
        let limiter = RateLimiter::new(2, WINDOW);
        let now = Instant::now();

        assert!(limiter.admit("k", now));
        assert!(limiter.admit("k", now));
        assert!(!limiter.admit("k", now));
        assert!(!limiter.admit("k", now));

        assert_eq!(limiter.visitor("k").unwrap().count, 2);
    }

    #[test]
    fn window_resets_after_elapsing() {
        let limiter = RateLimiter::new(2, WINDOW);
        let start = Instant::now();

        assert!(limiter.admit("k", start));
        assert!(limiter.admit("k", start));
        assert!(!limiter.admit("k", start + Duration::from_secs(30)));

        let later = start + WINDOW + Duration::from_millis(1);
        assert!(limiter.admit("k", later));

        let visitor = limiter.visitor("k").unwrap();
        assert_eq!(visitor.count, 1);
        assert_eq!(visitor.window_start, later);
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let limiter = RateLimiter::new(1, WINDOW);
        let start = Instant::now();

        assert!(limiter.admit("k", start));
        // Exactly one window later is still inside it.
        assert!(!limiter.admit("k", start + WINDOW));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, WINDOW);
        let now = Instant::now();

        assert!(limiter.admit("a", now));
        assert!(!limiter.admit("a", now));
        assert!(limiter.admit("b", now));
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn check_reports_time_left_in_window() {
        let limiter = RateLimiter::new(1, WINDOW);
        let start = Instant::now();

        assert!(limiter.check("k", start).is_ok());
        let err = limiter
            .check("k", start + Duration::from_secs(45))
            .unwrap_err();
        assert_eq!(err.retry_after, Duration::from_secs(15));
    }

    #[test]
    fn concurrent_admits_never_exceed_quota() {
        const N: usize = 16;
        let limiter = RateLimiter::new(N as u32, WINDOW);
        let barrier = Barrier::new(2 * N);
        let now = Instant::now();

        let admitted: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2 * N)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        limiter.admit("fresh-key", now)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(admitted.iter().filter(|a| **a).count(), N);
        assert_eq!(admitted.iter().filter(|a| !**a).count(), N);
    }

    #[test]
    fn sweep_removes_stale_and_keeps_recent() {
        let limiter = RateLimiter::new(10, WINDOW);
        let start = Instant::now();

        limiter.admit("stale", start);
        limiter.admit("recent", start);
        limiter.admit("recent", start + Duration::from_secs(50));

        let removed = limiter.sweep(start + Duration::from_secs(90));

        assert_eq!(removed, 1);
        assert!(limiter.visitor("stale").is_none());
        assert!(limiter.visitor("recent").is_some());
    }

    #[test]
    fn rejected_request_counts_as_activity() {
        let limiter = RateLimiter::new(1, WINDOW);
        let start = Instant::now();

        limiter.admit("k", start);
        assert!(!limiter.admit("k", start + Duration::from_secs(30)));

        assert_eq!(limiter.sweep(start + Duration::from_secs(70)), 0);
        assert_eq!(limiter.sweep(start + Duration::from_secs(91)), 1);
        assert!(limiter.is_empty());
    }

    #[test]
    fn swept_key_starts_a_new_window() {
        let limiter = RateLimiter::new(1, WINDOW);
        let start = Instant::now();

        limiter.admit("k", start);
        let later = start + 2 * WINDOW;
        limiter.sweep(later);

        assert!(limiter.admit("k", later));
        assert_eq!(limiter.visitor("k").unwrap().window_start, later);
    }
}
