//! Per-client fixed-window rate limiting.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Request count for one client within the current window.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    /// Count a request; returns true if it exceeds `max`.
    fn record(&mut self, now: Instant, window: Duration, max: u32) -> bool {
        if now.saturating_duration_since(self.window_start) >= window {
            *self = Self::new(now);
            return false;
        }
        if self.count > max {
            return true;
        }
        self.count += 1;
        self.count > max
    }
}

/// Fixed-window limiter keyed by client address.
///
/// A burst of up to `2 * max` can straddle a window boundary; the limiter
/// dampens abuse rather than enforcing exact quotas.
pub struct RateLimiter {
    windows: DashMap<IpAddr, RateWindow>,
    // Mirrors `windows.len()` without touching every shard.
    clients: AtomicUsize,
    max_requests: u32,
    window: Duration,
    idle: Duration,
    max_clients: usize,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            clients: AtomicUsize::new(0),
            max_requests,
            window,
            idle: window.max(Duration::from_secs(60)),
            max_clients: 100_000,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            clients: AtomicUsize::new(0),
            max_requests: config.max_requests,
            window: config.window(),
            idle: config.idle().max(config.window()),
            max_clients: config.max_clients,
        }
    }

    /// Record a request from `client` and report whether it is over the limit.
    pub fn is_limited(&self, client: IpAddr) -> bool {
        self.is_limited_at(client, Instant::now())
    }

    pub fn is_limited_at(&self, client: IpAddr, now: Instant) -> bool {
        if self.clients.load(Ordering::Relaxed) >= self.max_clients
            && !self.windows.contains_key(&client)
        {
            self.sweep_at(now);
        }

        let limited = match self.windows.entry(client) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().record(now, self.window, self.max_requests)
            }
            Entry::Vacant(entry) => {
                self.clients.fetch_add(1, Ordering::Relaxed);
                entry.insert(RateWindow::new(now));
                false
            }
        };

        if limited {
            tracing::warn!(client = %client, "Rate limit exceeded");
            metrics::record_rate_limited();
        }
        limited
    }

    /// Drop clients whose last window started more than the idle period ago.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.windows.retain(|_, w| {
            let keep = now.saturating_duration_since(w.window_start) < self.idle;
            if !keep {
                removed += 1;
            }
            keep
        });
        let remaining = self
            .clients
            .fetch_sub(removed, Ordering::Relaxed)
            .saturating_sub(removed);
        if removed > 0 {
            tracing::debug!(removed, remaining, "Swept idle rate-limit clients");
        }
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.load(Ordering::Relaxed)
    }

    /// Periodically sweep until shutdown is signalled.
    pub async fn run_sweeper(
        self: std::sync::Arc<Self>,
        interval: Duration,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate-limit sweeper stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn allows_max_then_limits() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        let now = Instant::now();

        for i in 0..5 {
            assert!(!limiter.is_limited_at(ip(1), now), "request {} should pass", i + 1);
        }
        assert!(limiter.is_limited_at(ip(1), now));
        assert!(limiter.is_limited_at(ip(1), now + Duration::from_millis(999)));
    }

    #[test]
    fn window_resets_after_elapsing() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        let start = Instant::now();

        assert!(!limiter.is_limited_at(ip(1), start));
        assert!(!limiter.is_limited_at(ip(1), start));
        assert!(limiter.is_limited_at(ip(1), start));

        let next = start + Duration::from_secs(1);
        assert!(!limiter.is_limited_at(ip(1), next));
        assert!(!limiter.is_limited_at(ip(1), next));
        assert!(limiter.is_limited_at(ip(1), next));
    }

    #[test]
    fn clients_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        let now = Instant::now();

        assert!(!limiter.is_limited_at(ip(1), now));
        assert!(limiter.is_limited_at(ip(1), now));
        assert!(!limiter.is_limited_at(ip(2), now));
    }

    #[test]
    fn sweep_drops_idle_clients() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        let start = Instant::now();
        limiter.is_limited_at(ip(1), start);
        limiter.is_limited_at(ip(2), start + Duration::from_secs(50));

        let removed = limiter.sweep_at(start + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn client_cap_triggers_sweep() {
        let config = RateLimitConfig {
            max_clients: 2,
            idle_secs: 10,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::from_config(&config);
        let start = Instant::now();
        limiter.is_limited_at(ip(1), start);
        limiter.is_limited_at(ip(2), start);

        limiter.is_limited_at(ip(3), start + Duration::from_secs(11));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn client_count_tracks_map_size() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        let start = Instant::now();
        for last in 0..10 {
            limiter.is_limited_at(ip(last), start + Duration::from_secs(u64::from(last) * 10));
            limiter.is_limited_at(ip(last), start + Duration::from_secs(u64::from(last) * 10));
        }
        assert_eq!(limiter.tracked_clients(), 10);
        assert_eq!(limiter.tracked_clients(), limiter.windows.len());

        assert_eq!(limiter.sweep_at(start + Duration::from_secs(125)), 7);
        assert_eq!(limiter.tracked_clients(), 3);
        assert_eq!(limiter.tracked_clients(), limiter.windows.len());
    }
}
