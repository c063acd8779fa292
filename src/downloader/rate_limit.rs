//! Minimum-delay rate limiting
//!
//! Every network operation in the download loops calls
//! [`RateLimiter::throttle`] first. The limiter guarantees that at least
//! `delay` has passed since the previous `throttle()` returned.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Gate enforcing a minimum delay between consecutive operations
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter with the given minimum delay
    ///
    /// # Arguments
    /// * `delay` - Minimum time between consecutive operations; zero disables throttling
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_release: Mutex::new(None),
        }
    }

    /// A limiter that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Configured minimum delay
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether this limiter ever waits
    pub fn is_enabled(&self) -> bool {
        !self.delay.is_zero()
    }

    /// Wait until the next operation may start
    ///
    /// Concurrent callers are serialized; each one observes the full delay
    /// after the previous caller was released.
    pub async fn throttle(&self) {
        if !self.is_enabled() {
            return;
        }

        let mut last_release = self.last_release.lock().await;
        if let Some(previous) = *last_release {
            let ready_at = previous + self.delay;
            if ready_at > Instant::now() {
                trace!(
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "Throttling before next operation"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_release = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(super::config::default_download_delay())
    }
}
