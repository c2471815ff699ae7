use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::interval};
use tracing::{debug, info, warn};
use vidgrab_core::RateLimiter;

/// Periodically forgets clients whose request history has left the window,
/// so the rate limiter's map does not grow for the life of the process.
pub struct CleanupService {
    rate_limiter: Arc<RateLimiter>,
    cleanup_interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl CleanupService {
    pub fn new(rate_limiter: Arc<RateLimiter>, cleanup_interval: Duration) -> Self {
        Self {
            rate_limiter,
            cleanup_interval,
            handle: None,
        }
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            warn!("Cleanup service is already running");
            return;
        }

        let rate_limiter = Arc::clone(&self.rate_limiter);
        // tokio's interval panics on a zero period
        let interval_duration = self.cleanup_interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            info!(
                "Starting rate limiter cleanup with interval: {:?}",
                interval_duration
            );

            let mut cleanup_interval = interval(interval_duration);
            // the first tick completes immediately and there is nothing to compact yet
            cleanup_interval.tick().await;

            loop {
                cleanup_interval.tick().await;

                let removed = rate_limiter.compact();
                if removed > 0 {
                    info!(
                        "Removed {} idle clients from rate limiter, {} still tracked",
                        removed,
                        rate_limiter.tracked_clients()
                    );
                } else {
                    debug!("No idle rate limiter clients to remove");
                }
            }
        });

        self.handle = Some(handle);
        info!("Cleanup service started successfully");
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Cleanup service stopped");
        } else {
            debug!("Cleanup service is not running");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for CleanupService {
    fn drop(&mut self) {
        self.stop();
    }
}
