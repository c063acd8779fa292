//! Job execution, rate limiting and session refresh
//!
//! This module provides the engine that turns one archive [`Job`] into files
//! on disk.
//!
//! # Overview
//!
//! 1. **Job Creation**: Describe what to archive with [`job::Job`]
//! 2. **Execution**: Run it with [`executor::JobExecutor`]
//! 3. **Rate Limiting**: Every network call waits on [`rate_limit::RateLimiter`]
//! 4. **Session Refresh**: Authorization failures go through [`auth_guard::TokenRefreshGuard`]
//! 5. **Progress Tracking**: Counters live in [`job::JobProgress`] and are
//!    readable while the job runs
//!
//! # Components
//!
//! - [`executor`] - Incremental and full execution loops
//! - [`job`] - Job description, status machine and counters
//! - [`attachment`] - Per-message attachment fetcher
//! - [`threads`] - Thread enumeration for full-channel archives
//! - [`history`] - Message history reader that survives token expiry
//! - [`rate_limit`] - Minimum delay between network operations
//! - [`auth_guard`] - Refresh-and-retry-once policy
//! - [`progress`] - Periodic progress logging
//! - [`config`] - Tunable constants
//!
//! # Error Handling
//!
//! Failures are graded by scope:
//! - Attachment failures are recorded and the job carries on
//! - A container whose history cannot be read is recorded and skipped
//! - An authorization failure that survives a refresh fails the job
//!   ([`JobFailure::AuthExhausted`])

pub mod attachment;
pub mod auth_guard;
pub mod config;
pub mod executor;
pub mod history;
pub mod job;
pub mod progress;
pub mod rate_limit;
pub mod threads;

pub use attachment::{AttachmentFetcher, AttachmentOutcome, FetchError, FetchResult, SkipReason};
pub use auth_guard::{with_token_refresh, TokenRefreshGuard};
pub use executor::JobExecutor;
pub use job::{
    ArchiveMode, FailedItem, Job, JobCounts, JobFailure, JobId, JobProgress, JobReport, JobStatus,
    JobTarget,
};
pub use rate_limit::RateLimiter;
pub use threads::ThreadEnumerator;
