//! Download configuration constants

use std::time::Duration;

/// Default delay between consecutive network operations (0.25s).
pub const DEFAULT_DOWNLOAD_DELAY_MS: u64 = 250;

/// Emit a progress log line at least every N saved files.
pub const PROGRESS_LOG_EVERY_FILES: u64 = 10;

/// Emit a progress log line at least this often while files are being saved.
pub const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Hard length limit of a single chat message.
pub const MESSAGE_CHAR_LIMIT: usize = 2000;

/// Budget for the completion notice, leaving headroom under [`MESSAGE_CHAR_LIMIT`].
pub const NOTIFICATION_CHAR_BUDGET: usize = 1900;

/// Default download delay as a [`Duration`]
pub fn default_download_delay() -> Duration {
    Duration::from_millis(DEFAULT_DOWNLOAD_DELAY_MS)
}

/// Convert a delay in (fractional) seconds to a [`Duration`]
///
/// Returns `None` for negative, NaN or infinite values.
pub fn delay_from_secs(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
