//! Single-owner download queue
//!
//! The [`QueueManager`] owns the pending jobs and the running slot. At most
//! one job executes at a time: enqueuing onto an idle queue promotes the job
//! and spawns the single worker task, which keeps pulling jobs in FIFO order
//! until the queue drains. The worker then sends the completion notice and
//! exits; the next enqueue starts a new session.
//!
//! All command-facing operations ([`enqueue`](QueueManager::enqueue),
//! [`stop`](QueueManager::stop), [`clear_pending`](QueueManager::clear_pending),
//! [`status`](QueueManager::status)) only touch in-memory state behind one
//! lock and return immediately.

use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info};

use crate::cancel::SharedCancel;
use crate::downloader::{
    ArchiveMode, Job, JobCounts, JobExecutor, JobFailure, JobId, JobProgress, JobReport, JobStatus,
    JobTarget, RateLimiter,
};
use crate::notify::CompletionNotifier;
use crate::platform::ChatPlatform;
use crate::UserId;

pub use crate::notify::QueueSummary;

/// Queue-level errors, returned synchronously to the caller
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The target is already pending or running
    #[error("{0} is already queued or downloading")]
    DuplicateTarget(String),

    /// `stop` was called with nothing running
    #[error("no active download")]
    NoActiveJob,

    /// `enqueue` was called outside a Tokio runtime
    #[error("no async runtime available to run downloads")]
    RuntimeUnavailable,
}

/// Where an accepted job landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The queue was idle; the job is running now
    Started(JobId),
    /// Waiting behind the running job, 1-based position in the pending list
    Queued {
        /// Job identifier
        id: JobId,
        /// Position among pending jobs
        position: usize,
    },
}

impl Enqueued {
    /// Identifier of the accepted job
    pub fn job_id(&self) -> JobId {
        match self {
            Enqueued::Started(id) | Enqueued::Queued { id, .. } => *id,
        }
    }
}

/// Snapshot of the running job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningStatus {
    /// Job identifier
    pub id: JobId,
    /// Archive target
    pub target: JobTarget,
    /// Archive mode
    pub mode: ArchiveMode,
    /// Requesting user
    pub requested_by: UserId,
    /// Counters so far
    pub counts: JobCounts,
    /// Whether a stop was requested
    pub stopping: bool,
    /// Time since the job started
    pub elapsed: Duration,
}

/// A job waiting in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStatus {
    /// Job identifier
    pub id: JobId,
    /// Archive target
    pub target: JobTarget,
    /// Archive mode
    pub mode: ArchiveMode,
    /// Requesting user
    pub requested_by: UserId,
}

/// Snapshot returned by [`QueueManager::status`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueStatus {
    /// The running job, if any
    pub running: Option<RunningStatus>,
    /// Pending jobs in execution order
    pub pending: Vec<PendingStatus>,
}

impl QueueStatus {
    /// Nothing running and nothing pending
    pub fn is_idle(&self) -> bool {
        self.running.is_none() && self.pending.is_empty()
    }
}

struct RunningSlot {
    id: JobId,
    target: JobTarget,
    mode: ArchiveMode,
    requested_by: UserId,
    progress: Arc<JobProgress>,
    cancel: SharedCancel,
    started: Instant,
}

impl RunningSlot {
    fn for_job(job: &Job) -> Self {
        Self {
            id: job.id(),
            target: job.target().clone(),
            mode: job.mode(),
            requested_by: job.requested_by(),
            progress: job.progress(),
            cancel: job.cancel_flag(),
            started: Instant::now(),
        }
    }

    /// Report for a job whose execution panicked
    fn crashed_report(&self) -> JobReport {
        JobReport {
            id: self.id,
            target: self.target.clone(),
            mode: self.mode,
            requested_by: self.requested_by,
            status: JobStatus::Failed,
            counts: self.progress.snapshot(),
            failure: Some(JobFailure::Platform("download task panicked".to_string())),
            failed_items: Vec::new(),
            elapsed: self.started.elapsed(),
        }
    }
}

struct Session {
    started: Instant,
    reports: Vec<JobReport>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    running: Option<RunningSlot>,
    session: Option<Session>,
    last_summary: Option<QueueSummary>,
}

struct Inner {
    executor: JobExecutor,
    notifier: CompletionNotifier,
    state: Mutex<QueueState>,
    idle: watch::Sender<bool>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builder for [`QueueManager`]
pub struct QueueManagerBuilder {
    platform: Arc<dyn ChatPlatform>,
    owner: UserId,
    root: PathBuf,
    download_delay: Duration,
}

impl QueueManagerBuilder {
    /// Minimum delay between network operations (default 0.25s)
    pub fn download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = delay;
        self
    }

    /// Build the queue
    pub fn build(self) -> QueueManager {
        let limiter = Arc::new(RateLimiter::new(self.download_delay));
        let (idle, _) = watch::channel(true);

        QueueManager {
            inner: Arc::new(Inner {
                executor: JobExecutor::new(self.platform.clone(), limiter, self.root.clone()),
                notifier: CompletionNotifier::new(self.platform, self.owner, self.root),
                state: Mutex::new(QueueState::default()),
                idle,
            }),
        }
    }
}

/// Handle to the download queue; clones share the same queue
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<Inner>,
}

impl QueueManager {
    /// Start building a queue
    ///
    /// # Arguments
    /// * `platform` - Chat platform used by every job and for the completion notice
    /// * `owner` - User who always receives the completion notice
    /// * `root` - Archive root directory
    pub fn builder(
        platform: Arc<dyn ChatPlatform>,
        owner: UserId,
        root: impl Into<PathBuf>,
    ) -> QueueManagerBuilder {
        QueueManagerBuilder {
            platform,
            owner,
            root: root.into(),
            download_delay: crate::downloader::config::default_download_delay(),
        }
    }

    /// Add a job; starts it immediately when nothing is running
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue(&self, job: Job) -> Result<Enqueued, QueueError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| QueueError::RuntimeUnavailable)?;
        let mut state = self.inner.state();

        let key = job.target().key();
        let running_same = state
            .running
            .as_ref()
            .is_some_and(|slot| slot.target.key() == key);
        let pending_same = state.pending.iter().any(|queued| queued.target().key() == key);
        if running_same || pending_same {
            info!(target = %job.target(), "Rejecting duplicate archive request");
            return Err(QueueError::DuplicateTarget(job.target().to_string()));
        }

        let id = job.id();
        if state.running.is_some() {
            info!(job_id = %id, target = %job.target(), mode = %job.mode(), "Job queued");
            state.pending.push_back(job);
            return Ok(Enqueued::Queued {
                id,
                position: state.pending.len(),
            });
        }

        info!(job_id = %id, target = %job.target(), mode = %job.mode(), "Queue idle, starting job");
        state.running = Some(RunningSlot::for_job(&job));
        if state.session.is_none() {
            state.session = Some(Session {
                started: Instant::now(),
                reports: Vec::new(),
            });
        }
        self.inner.idle.send_replace(false);
        drop(state);

        runtime.spawn(drive(self.inner.clone(), job));
        Ok(Enqueued::Started(id))
    }

    /// Request cancellation of the running job; pending jobs are untouched
    pub fn stop(&self) -> Result<JobId, QueueError> {
        let state = self.inner.state();
        let slot = state.running.as_ref().ok_or(QueueError::NoActiveJob)?;
        info!(job_id = %slot.id, "Stop requested");
        slot.cancel.cancel();
        Ok(slot.id)
    }

    /// Drop every pending job; returns how many were removed
    pub fn clear_pending(&self) -> usize {
        let removed = {
            let mut state = self.inner.state();
            std::mem::take(&mut state.pending)
        };
        if !removed.is_empty() {
            info!(removed = removed.len(), "Cleared pending jobs");
        }
        removed.len()
    }

    /// Running job progress and pending targets
    pub fn status(&self) -> QueueStatus {
        let state = self.inner.state();
        QueueStatus {
            running: state.running.as_ref().map(|slot| RunningStatus {
                id: slot.id,
                target: slot.target.clone(),
                mode: slot.mode,
                requested_by: slot.requested_by,
                counts: slot.progress.snapshot(),
                stopping: slot.cancel.is_cancelled(),
                elapsed: slot.started.elapsed(),
            }),
            pending: state
                .pending
                .iter()
                .map(|job| PendingStatus {
                    id: job.id(),
                    target: job.target().clone(),
                    mode: job.mode(),
                    requested_by: job.requested_by(),
                })
                .collect(),
        }
    }

    /// Summary of the most recently drained session
    pub fn last_summary(&self) -> Option<QueueSummary> {
        self.inner.state().last_summary.clone()
    }

    /// Wait until nothing is running and the completion notice went out
    pub async fn wait_until_idle(&self) {
        let mut idle = self.inner.idle.subscribe();
        // The sender lives in `inner`, which `self` keeps alive
        let _ = idle.wait_for(|idle| *idle).await;
    }
}

/// Worker loop: runs `job`, then every pending job, then notifies
async fn drive(inner: Arc<Inner>, first: Job) {
    let mut current = first;
    let summary = loop {
        let report = match AssertUnwindSafe(inner.executor.run(current))
            .catch_unwind()
            .await
        {
            Ok(report) => report,
            Err(_) => {
                let state = inner.state();
                match state.running.as_ref() {
                    Some(slot) => {
                        error!(job_id = %slot.id, "Archive job panicked");
                        slot.crashed_report()
                    }
                    None => {
                        error!("Archive job panicked with no running slot");
                        return;
                    }
                }
            }
        };

        let mut state = inner.state();
        if let Some(session) = state.session.as_mut() {
            session.reports.push(report);
        }
        match state.pending.pop_front() {
            Some(job) => {
                info!(job_id = %job.id(), target = %job.target(), "Starting next queued job");
                state.running = Some(RunningSlot::for_job(&job));
                current = job;
            }
            None => {
                // Clear the slot and close the session together so a new
                // enqueue always opens a fresh session
                state.running = None;
                let summary = state.session.take().map(|session| QueueSummary {
                    jobs: session.reports,
                    elapsed: session.started.elapsed(),
                });
                state.last_summary = summary.clone();
                break summary;
            }
        }
    };

    if let Some(summary) = summary {
        let totals = summary.totals();
        info!(
            jobs = summary.jobs.len(),
            files_saved = totals.files_saved,
            files_failed = totals.files_failed,
            "Queue drained"
        );
        inner.notifier.notify(&summary).await;
    }

    let still_idle = inner.state().running.is_none();
    if still_idle {
        inner.idle.send_replace(true);
    }
}
