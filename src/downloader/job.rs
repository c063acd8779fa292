//! Archive job description, status machine and progress counters

use crate::cancel::{CancelFlag, SharedCancel};
use crate::{Container, ContainerId, MessageId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl JobId {
    fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// What a job archives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobTarget {
    /// A single channel or thread
    ChannelOnly(Container),
    /// A channel followed by every active and archived thread under it
    ChannelWithThreads(Container),
}

impl JobTarget {
    /// The channel (or thread) the job starts from
    pub fn container(&self) -> &Container {
        match self {
            JobTarget::ChannelOnly(c) | JobTarget::ChannelWithThreads(c) => c,
        }
    }

    /// Identity used for duplicate detection
    pub fn key(&self) -> ContainerId {
        self.container().id
    }

    /// Whether the job also walks the channel's threads
    pub fn includes_threads(&self) -> bool {
        matches!(self, JobTarget::ChannelWithThreads(_))
    }
}

impl fmt::Display for JobTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobTarget::ChannelOnly(c) => write!(f, "{c}"),
            JobTarget::ChannelWithThreads(c) => write!(f, "{c} (+threads)"),
        }
    }
}

/// How far back a job reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveMode {
    /// Newest first, stopping at the first message authored by the bot
    Incremental,
    /// Every message, ignoring earlier bot messages
    Full,
}

impl fmt::Display for ArchiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveMode::Incremental => write!(f, "incremental"),
            ArchiveMode::Full => write!(f, "full"),
        }
    }
}

/// Job execution status
///
/// Moves only `Pending → Running → {Cancelled, Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JobStatus {
    /// Waiting in the queue
    #[default]
    Pending,
    /// The download loop is executing
    Running,
    /// Stopped by request; counts gathered so far are kept
    Cancelled,
    /// Finished scanning every container
    Completed,
    /// Aborted by a job-level failure
    Failed,
}

impl JobStatus {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Cancelled | JobStatus::Completed | JobStatus::Failed
        )
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    /// Lowercase label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Rejected status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid job status transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    /// Current status
    pub from: JobStatus,
    /// Requested status
    pub to: JobStatus,
}

/// Why a job ended in [`JobStatus::Failed`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum JobFailure {
    /// The session could not be renewed, even after one refresh and retry
    #[error("authorization exhausted: {0}")]
    AuthExhausted(String),

    /// A platform error that prevented the job from running
    #[error("platform error: {0}")]
    Platform(String),
}

/// Snapshot of a job's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobCounts {
    /// Attachments written to disk
    pub files_saved: u64,
    /// Attachments that could not be saved
    pub files_failed: u64,
    /// Attachments deliberately not saved (e.g. stop requested mid-message)
    pub files_skipped: u64,
    /// Messages inspected
    pub messages_scanned: u64,
    /// Channels and threads fully or partially scanned
    pub containers_scanned: u64,
    /// Bytes written to disk
    pub bytes_saved: u64,
}

impl JobCounts {
    /// Element-wise sum
    pub fn add(&mut self, other: &JobCounts) {
        self.files_saved += other.files_saved;
        self.files_failed += other.files_failed;
        self.files_skipped += other.files_skipped;
        self.messages_scanned += other.messages_scanned;
        self.containers_scanned += other.containers_scanned;
        self.bytes_saved += other.bytes_saved;
    }
}

/// Live counters, shared between the executing job and status queries
///
/// Counters only ever increase.
#[derive(Debug, Default)]
pub struct JobProgress {
    files_saved: AtomicU64,
    files_failed: AtomicU64,
    files_skipped: AtomicU64,
    messages_scanned: AtomicU64,
    containers_scanned: AtomicU64,
    bytes_saved: AtomicU64,
}

impl JobProgress {
    /// Record a saved attachment of `bytes` bytes
    pub fn record_saved(&self, bytes: u64) {
        self.files_saved.fetch_add(1, Ordering::Relaxed);
        self.bytes_saved.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record an attachment that failed
    pub fn record_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an attachment that was skipped
    pub fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an inspected message
    pub fn record_message(&self) {
        self.messages_scanned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a container the job started scanning
    pub fn record_container(&self) {
        self.containers_scanned.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough snapshot for reporting
    pub fn snapshot(&self) -> JobCounts {
        JobCounts {
            files_saved: self.files_saved.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            messages_scanned: self.messages_scanned.load(Ordering::Relaxed),
            containers_scanned: self.containers_scanned.load(Ordering::Relaxed),
            bytes_saved: self.bytes_saved.load(Ordering::Relaxed),
        }
    }
}

/// Something that could not be archived, reported in the completion notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    /// Attachment filename, or the container name for unreadable histories
    pub name: String,
    /// Link to the message (or container) in the client
    pub link: String,
    /// Error description
    pub reason: String,
}

/// One archive request
#[derive(Debug)]
pub struct Job {
    id: JobId,
    target: JobTarget,
    mode: ArchiveMode,
    requested_by: UserId,
    status_message: Option<MessageId>,
    status: JobStatus,
    progress: Arc<JobProgress>,
    cancel: SharedCancel,
    failure: Option<JobFailure>,
    failed_items: Vec<FailedItem>,
}

impl Job {
    /// Create a pending job
    pub fn new(target: JobTarget, mode: ArchiveMode, requested_by: UserId) -> Self {
        Self {
            id: JobId::next(),
            target,
            mode,
            requested_by,
            status_message: None,
            status: JobStatus::Pending,
            progress: Arc::new(JobProgress::default()),
            cancel: CancelFlag::shared(),
            failure: None,
            failed_items: Vec::new(),
        }
    }

    /// Incremental job for a target
    pub fn incremental(target: JobTarget, requested_by: UserId) -> Self {
        Self::new(target, ArchiveMode::Incremental, requested_by)
    }

    /// Full job for a target
    pub fn full(target: JobTarget, requested_by: UserId) -> Self {
        Self::new(target, ArchiveMode::Full, requested_by)
    }

    /// Exclude the bot's acknowledgement message for this request from stop-marker detection
    pub fn with_status_message(mut self, message: MessageId) -> Self {
        self.status_message = Some(message);
        self
    }

    /// Job identifier
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Archive target
    pub fn target(&self) -> &JobTarget {
        &self.target
    }

    /// Archive mode
    pub fn mode(&self) -> ArchiveMode {
        self.mode
    }

    /// User who asked for this job
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    /// Bot message that must not act as a stop marker
    pub fn status_message(&self) -> Option<MessageId> {
        self.status_message
    }

    /// Current status
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Shared live counters
    pub fn progress(&self) -> Arc<JobProgress> {
        self.progress.clone()
    }

    /// Shared cancellation flag
    pub fn cancel_flag(&self) -> SharedCancel {
        self.cancel.clone()
    }

    /// Whether a stop was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Failure reason, once failed
    pub fn failure(&self) -> Option<&JobFailure> {
        self.failure.as_ref()
    }

    /// Move to `next`, enforcing the status machine
    pub fn transition(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Move to [`JobStatus::Failed`] with a reason
    pub fn fail(&mut self, failure: JobFailure) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Failed)?;
        self.failure = Some(failure);
        Ok(())
    }

    /// Remember an item for the failure report
    pub fn push_failed_item(&mut self, item: FailedItem) {
        self.failed_items.push(item);
    }

    /// Terminal summary; the job itself is consumed
    pub fn into_report(self, elapsed: Duration) -> JobReport {
        JobReport {
            id: self.id,
            target: self.target,
            mode: self.mode,
            requested_by: self.requested_by,
            status: self.status,
            counts: self.progress.snapshot(),
            failure: self.failure,
            failed_items: self.failed_items,
            elapsed,
        }
    }
}

/// What remains of a job once it is terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Job identifier
    pub id: JobId,
    /// Archive target
    pub target: JobTarget,
    /// Archive mode
    pub mode: ArchiveMode,
    /// Requesting user
    pub requested_by: UserId,
    /// Terminal status
    pub status: JobStatus,
    /// Final counters
    pub counts: JobCounts,
    /// Failure reason for [`JobStatus::Failed`]
    pub failure: Option<JobFailure>,
    /// Attachments and containers that could not be archived
    pub failed_items: Vec<FailedItem>,
    /// Wall time spent running
    pub elapsed: Duration,
}

impl JobReport {
    /// Whether the job died on an unrecoverable authorization failure
    pub fn auth_exhausted(&self) -> bool {
        matches!(self.failure, Some(JobFailure::AuthExhausted(_)))
    }
}
