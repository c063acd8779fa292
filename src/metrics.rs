//! Archive metrics
//!
//! Counters and histograms are emitted through the `metrics` facade. Without
//! an installed recorder every call is a no-op, so library users and tests pay
//! nothing. The binary installs a Prometheus exporter with [`init_metrics`]
//! when `--metrics-addr` is given.
//!
//! ## Metrics
//!
//! - `attachments_saved_total` / `attachment_bytes_total`
//! - `attachments_failed_total`
//! - `token_refreshes_total`
//! - `jobs_finished_total{mode, status}`
//! - `job_duration_seconds{mode}`

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::downloader::{ArchiveMode, JobStatus};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Install the Prometheus exporter on `addr`
///
/// Idempotent: later calls return `Ok(())` without rebinding.
pub async fn init_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "attachments_saved_total",
        Unit::Count,
        "Attachments written to the archive"
    );
    describe_counter!(
        "attachment_bytes_total",
        Unit::Bytes,
        "Bytes written to the archive"
    );
    describe_counter!(
        "attachments_failed_total",
        Unit::Count,
        "Attachments that could not be saved"
    );
    describe_counter!(
        "token_refreshes_total",
        Unit::Count,
        "Session refreshes triggered by authorization failures"
    );
    describe_counter!(
        "jobs_finished_total",
        Unit::Count,
        "Archive jobs that reached a terminal status"
    );
    describe_histogram!(
        "job_duration_seconds",
        Unit::Seconds,
        "Wall time of archive jobs"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record a saved attachment
pub fn record_attachment_saved(bytes: u64) {
    counter!("attachments_saved_total").increment(1);
    counter!("attachment_bytes_total").increment(bytes);
}

/// Record an attachment that failed
pub fn record_attachment_failed() {
    counter!("attachments_failed_total").increment(1);
}

/// Record a session refresh attempt
pub fn record_token_refresh() {
    counter!("token_refreshes_total").increment(1);
}

/// Archive job metrics
pub struct JobMetrics {
    mode: &'static str,
    start_time: Instant,
}

impl JobMetrics {
    /// Start timing a job
    pub fn start(mode: ArchiveMode) -> Self {
        Self {
            mode: match mode {
                ArchiveMode::Incremental => "incremental",
                ArchiveMode::Full => "full",
            },
            start_time: Instant::now(),
        }
    }

    /// Record the job's terminal status and duration
    pub fn finish(self, status: JobStatus) {
        let duration = self.start_time.elapsed();

        counter!(
            "jobs_finished_total",
            "mode" => self.mode,
            "status" => status.as_str(),
        )
        .increment(1);

        histogram!("job_duration_seconds", "mode" => self.mode).record(duration.as_secs_f64());

        debug!(
            mode = self.mode,
            status = status.as_str(),
            duration_ms = duration.as_millis() as u64,
            "Job metrics recorded"
        );
    }
}
