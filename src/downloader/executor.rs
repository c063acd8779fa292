//! Job execution loops
//!
//! [`JobExecutor::run`] takes a pending [`Job`], drives it to a terminal
//! status and returns its [`JobReport`]. It never panics on platform or
//! filesystem errors; they are graded into item, container and job level
//! failures.
//!
//! # Incremental mode
//!
//! The history is read newest first. The first message authored by the bot
//! (other than the job's own status message) is the end of the previous run
//! and halts the scan. For channel-with-threads jobs that marker also filters
//! out threads created before it, and each remaining thread is scanned the
//! same way.
//!
//! # Full mode
//!
//! Every message of the channel is read, then every active and archived
//! thread, in the order the platform lists them. Bot messages are ignored.
//!
//! # Cancellation
//!
//! The job's cancel flag is polled before each container and before each
//! message. In-flight operations finish first; counts are kept.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use super::attachment::{AttachmentFetcher, AttachmentOutcome};
use super::auth_guard::TokenRefreshGuard;
use super::history::HistoryReader;
use super::job::{ArchiveMode, FailedItem, Job, JobFailure, JobReport, JobStatus};
use super::progress::{format_duration, ProgressReporter};
use super::rate_limit::RateLimiter;
use super::threads::ThreadEnumerator;
use crate::metrics::JobMetrics;
use crate::output::ArchivePathBuilder;
use crate::platform::{ChatPlatform, HistoryOrder};
use crate::{Container, MessageId};

/// How the scan of one container ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerEnd {
    /// Reached the oldest message
    Exhausted,
    /// Found the previous run's marker
    StopMarker(MessageId),
    /// History could not be read; recorded as a failed item
    Unreadable,
    /// Stop requested
    Cancelled,
}

/// How the whole job ended, short of a job-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanEnd {
    Finished,
    Cancelled,
}

/// Runs archive jobs against a platform
pub struct JobExecutor {
    platform: Arc<dyn ChatPlatform>,
    guard: TokenRefreshGuard,
    limiter: Arc<RateLimiter>,
    fetcher: AttachmentFetcher,
    threads: ThreadEnumerator,
    root: PathBuf,
}

impl JobExecutor {
    /// Create an executor writing below `root`
    ///
    /// # Arguments
    /// * `platform` - Chat platform to read from
    /// * `limiter` - Rate limiter shared by every network call of every job
    /// * `root` - Archive root directory
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        limiter: Arc<RateLimiter>,
        root: impl Into<PathBuf>,
    ) -> Self {
        let guard = TokenRefreshGuard::new(platform.clone());
        Self {
            fetcher: AttachmentFetcher::new(platform.clone(), guard.clone(), limiter.clone()),
            threads: ThreadEnumerator::new(platform.clone(), guard.clone(), limiter.clone()),
            platform,
            guard,
            limiter,
            root: root.into(),
        }
    }

    /// Run `job` to a terminal status
    pub async fn run(&self, job: Job) -> JobReport {
        let span = info_span!(
            "archive_job",
            job_id = %job.id(),
            target = %job.target(),
            mode = %job.mode(),
        );
        self.run_job(job).instrument(span).await
    }

    async fn run_job(&self, mut job: Job) -> JobReport {
        let started = Instant::now();
        let metrics = JobMetrics::start(job.mode());

        if let Err(e) = job.transition(JobStatus::Running) {
            warn!(error = %e, "Job is not pending, refusing to run it");
            return job.into_report(started.elapsed());
        }
        info!("Starting archive job");

        let mut reporter = ProgressReporter::new();
        let outcome = self.execute(&mut job, &mut reporter).await;

        let status_result = match outcome {
            Ok(ScanEnd::Finished) if !job.is_cancelled() => job.transition(JobStatus::Completed),
            Ok(_) => job.transition(JobStatus::Cancelled),
            Err(failure) => {
                warn!(error = %failure, "Archive job failed");
                job.fail(failure)
            }
        };
        if let Err(e) = status_result {
            warn!(error = %e, "Unexpected job status transition");
        }

        let elapsed = started.elapsed();
        let report = job.into_report(elapsed);
        metrics.finish(report.status);

        info!(
            status = report.status.as_str(),
            files_saved = report.counts.files_saved,
            files_failed = report.counts.files_failed,
            messages_scanned = report.counts.messages_scanned,
            containers = report.counts.containers_scanned,
            elapsed = %format_duration(elapsed),
            "Archive job finished"
        );
        report
    }

    async fn execute(
        &self,
        job: &mut Job,
        reporter: &mut ProgressReporter,
    ) -> Result<ScanEnd, JobFailure> {
        let target = job.target().clone();
        let mode = job.mode();
        let channel = target.container();

        let channel_end = self.scan_container(job, channel, reporter).await?;
        if channel_end == ContainerEnd::Cancelled {
            return Ok(ScanEnd::Cancelled);
        }
        if !target.includes_threads() {
            return Ok(ScanEnd::Finished);
        }

        let marker = match (mode, channel_end) {
            (ArchiveMode::Incremental, ContainerEnd::StopMarker(id)) => Some(id),
            _ => None,
        };

        if job.is_cancelled() {
            return Ok(ScanEnd::Cancelled);
        }
        let threads = match self.threads.enumerate(channel, marker).await {
            Ok(set) => set,
            Err(e) if e.is_auth_exhausted() => {
                return Err(JobFailure::AuthExhausted(e.to_string()));
            }
            Err(e) => {
                warn!(
                    channel = %channel,
                    error = %e,
                    "Could not list threads, archiving the channel only"
                );
                job.push_failed_item(FailedItem {
                    name: format!("threads of {channel}"),
                    link: String::new(),
                    reason: e.to_string(),
                });
                return Ok(ScanEnd::Finished);
            }
        };

        for thread in threads {
            if job.is_cancelled() {
                return Ok(ScanEnd::Cancelled);
            }
            if self.scan_container(job, &thread, reporter).await? == ContainerEnd::Cancelled {
                return Ok(ScanEnd::Cancelled);
            }
        }

        Ok(ScanEnd::Finished)
    }

    async fn scan_container(
        &self,
        job: &mut Job,
        container: &Container,
        reporter: &mut ProgressReporter,
    ) -> Result<ContainerEnd, JobFailure> {
        if job.is_cancelled() {
            return Ok(ContainerEnd::Cancelled);
        }

        let dest = match ArchivePathBuilder::for_container(&self.root, container).build() {
            Ok(dest) => dest,
            Err(e) => {
                job.push_failed_item(FailedItem {
                    name: container.to_string(),
                    link: String::new(),
                    reason: e.to_string(),
                });
                return Ok(ContainerEnd::Unreadable);
            }
        };

        info!(container = %container, dest = %dest.display(), "Scanning container");
        reporter.set_phase(Some(container.to_string()));

        let progress = job.progress();
        let cancel = job.cancel_flag();
        let bot = self.platform.bot_user_id();
        let incremental = job.mode() == ArchiveMode::Incremental;
        progress.record_container();

        let mut reader = HistoryReader::new(
            self.platform.clone(),
            self.guard.clone(),
            self.limiter.clone(),
            container.id,
            HistoryOrder::NewestFirst,
        );

        loop {
            if cancel.is_cancelled() {
                info!(container = %container, "Stop requested, ending scan");
                return Ok(ContainerEnd::Cancelled);
            }

            let message = match reader.next().await {
                None => return Ok(ContainerEnd::Exhausted),
                Some(Ok(message)) => message,
                Some(Err(e)) if e.is_auth_exhausted() => {
                    return Err(JobFailure::AuthExhausted(e.to_string()));
                }
                Some(Err(e)) => {
                    warn!(
                        container = %container,
                        error = %e,
                        "History unreadable, skipping container"
                    );
                    job.push_failed_item(FailedItem {
                        name: container.to_string(),
                        link: String::new(),
                        reason: e.to_string(),
                    });
                    return Ok(ContainerEnd::Unreadable);
                }
            };

            if incremental && message.author == bot && job.status_message() != Some(message.id) {
                info!(
                    container = %container,
                    marker = %message.id,
                    "Reached previous archive marker"
                );
                return Ok(ContainerEnd::StopMarker(message.id));
            }

            progress.record_message();
            if !message.has_attachments() {
                continue;
            }

            let mut exhausted = None;
            for (attachment, outcome) in self.fetcher.fetch(&message, &dest, &cancel).await {
                match outcome {
                    AttachmentOutcome::Saved { bytes, .. } => progress.record_saved(bytes),
                    AttachmentOutcome::Skipped(_) => progress.record_skipped(),
                    AttachmentOutcome::Failed(e) => {
                        progress.record_failed();
                        if e.is_auth_exhausted() {
                            exhausted = Some(e.to_string());
                        }
                        job.push_failed_item(FailedItem {
                            name: attachment.filename.clone(),
                            link: message.jump_url.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            if let Some(reason) = exhausted {
                return Err(JobFailure::AuthExhausted(reason));
            }

            let counts = progress.snapshot();
            if reporter.should_emit_update(&counts) {
                info!("{}", reporter.format_progress(&counts));
                reporter.mark_emitted(&counts);
            }
        }
    }
}
