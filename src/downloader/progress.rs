//! Periodic progress logging for running archive jobs.
//!
//! The executor feeds every attachment outcome into a [`ProgressReporter`].
//! A line is emitted every [`PROGRESS_LOG_EVERY_FILES`] processed files or
//! every [`PROGRESS_LOG_INTERVAL`], whichever comes first.

use std::time::Duration;
use tokio::time::Instant;

use super::config::{PROGRESS_LOG_EVERY_FILES, PROGRESS_LOG_INTERVAL};
use super::job::JobCounts;

/// Cadence state for progress lines
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    start_time: Instant,
    last_update: Instant,
    update_interval: Duration,
    every_files: u64,
    last_reported_files: u64,
    current_phase: Option<String>,
}

impl ProgressReporter {
    /// Reporter with the default cadence
    pub fn new() -> Self {
        Self::with_cadence(PROGRESS_LOG_INTERVAL, PROGRESS_LOG_EVERY_FILES)
    }

    /// Reporter with a custom interval and file step
    pub fn with_cadence(update_interval: Duration, every_files: u64) -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_update: now,
            update_interval,
            every_files: every_files.max(1),
            last_reported_files: 0,
            current_phase: None,
        }
    }

    /// Set the label of the container being scanned (e.g. "#general")
    pub fn set_phase<S: Into<String>>(&mut self, phase: Option<S>) {
        self.current_phase = phase.map(|s| s.into());
    }

    /// Time since the reporter was created
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Whether a progress line is due for these counts
    pub fn should_emit_update(&self, counts: &JobCounts) -> bool {
        let processed = processed_files(counts);
        if processed == 0 {
            return false;
        }
        if processed.saturating_sub(self.last_reported_files) >= self.every_files {
            return true;
        }
        processed > self.last_reported_files && self.last_update.elapsed() >= self.update_interval
    }

    /// Call after emitting a progress line
    pub fn mark_emitted(&mut self, counts: &JobCounts) {
        self.last_update = Instant::now();
        self.last_reported_files = processed_files(counts);
    }

    /// Human-readable progress line
    pub fn format_progress(&self, counts: &JobCounts) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] Saved {} files ({})",
            counts.files_saved,
            format_bytes(counts.bytes_saved)
        )];

        if counts.files_failed > 0 {
            parts.push(format!("- {} failed", counts.files_failed));
        }

        parts.push(format!("- {} messages scanned", counts.messages_scanned));

        if let Some(phase) = &self.current_phase {
            parts.push(format!("({phase})"));
        }

        let elapsed = self.elapsed().as_secs_f64();
        if elapsed >= 1.0 && counts.files_saved > 0 {
            parts.push(format!(
                "at {:.1} files/min",
                counts.files_saved as f64 * 60.0 / elapsed
            ));
        }

        parts.push(format!("- {} elapsed", format_duration(self.elapsed())));
        parts.join(" ")
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn processed_files(counts: &JobCounts) -> u64 {
    counts.files_saved + counts.files_failed
}

/// Short duration label: `42s`, `7m`, `1.5h`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}

/// Short size label: `512 B`, `3.2 KiB`, `1.0 MiB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
