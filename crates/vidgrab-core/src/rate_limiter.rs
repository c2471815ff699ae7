use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests_per_client: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_client: 10,
            window: Duration::from_secs(60 * 60),
        }
    }
}

/// Sliding-window admission control keyed by client identity.
///
/// Each client keeps the timestamps of its admitted requests. Timestamps that
/// fall out of the window are dropped lazily when that client is checked
/// again; [`RateLimiter::compact`] removes clients that have gone idle.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    /// Admits or rejects a request from `client_id` at the current instant.
    pub fn admit(&self, client_id: &str) -> bool {
        self.admit_at(client_id, Instant::now())
    }

    /// Admits or rejects a request from `client_id` observed at `now`.
    ///
    /// Rejected requests are not recorded, so they do not extend the time a
    /// client stays limited.
    pub fn admit_at(&self, client_id: &str, now: Instant) -> bool {
        let mut history = self.clients.entry(client_id.to_string()).or_default();
        self.evict_expired(&mut history, now);

        if history.len() >= self.config.max_requests_per_client {
            debug!(
                "Rate limit reached for '{}': {}/{} requests in window",
                client_id,
                history.len(),
                self.config.max_requests_per_client
            );
            return false;
        }

        history.push_back(now);
        debug!(
            "Admitted request for '{}': {}/{} requests in window",
            client_id,
            history.len(),
            self.config.max_requests_per_client
        );
        true
    }

    /// Number of requests from `client_id` that still count against its limit.
    pub fn usage(&self, client_id: &str) -> usize {
        self.usage_at(client_id, Instant::now())
    }

    pub fn usage_at(&self, client_id: &str, now: Instant) -> usize {
        let Some(history) = self.clients.get(client_id) else {
            return 0;
        };
        match now.checked_sub(self.config.window) {
            Some(lower_bound) => history.iter().filter(|ts| **ts > lower_bound).count(),
            None => history.len(),
        }
    }

    /// Drops clients with no request inside the window. Returns how many were removed.
    pub fn compact(&self) -> usize {
        self.compact_at(Instant::now())
    }

    pub fn compact_at(&self, now: Instant) -> usize {
        let before = self.clients.len();
        self.clients.retain(|_, history| {
            self.evict_expired(history, now);
            !history.is_empty()
        });
        before.saturating_sub(self.clients.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn max_requests_per_client(&self) -> usize {
        self.config.max_requests_per_client
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }

    fn evict_expired(&self, history: &mut VecDeque<Instant>, now: Instant) {
        let Some(lower_bound) = now.checked_sub(self.config.window) else {
            return;
        };
        while history.front().is_some_and(|ts| *ts <= lower_bound) {
            history.pop_front();
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
