//! Per-message attachment fetcher
//!
//! Saves every attachment of one message into a destination directory. Each
//! download waits on the shared [`RateLimiter`] and goes through the
//! [`TokenRefreshGuard`]. Names are sanitized and never overwrite an existing
//! file. A failed attachment does not stop the remaining ones, except for
//! [`PlatformError::AuthExhausted`], which ends the message immediately since
//! no further call can succeed.

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::auth_guard::TokenRefreshGuard;
use super::rate_limit::RateLimiter;
use crate::cancel::CancelFlag;
use crate::metrics;
use crate::output::{
    create_unique, discard_partial, ensure_dir, sanitize_component, OutputError, OutputResult,
};
use crate::platform::{ByteStream, ChatPlatform, PlatformError, PlatformResult};
use crate::{Attachment, Message};

/// Why an attachment was not downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A stop was requested before the attachment was reached
    Cancelled,
    /// An earlier attachment exhausted the session
    SessionExhausted,
}

/// Attachment-level failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Download could not be opened or streamed
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// File could not be created or written
    #[error(transparent)]
    Output(#[from] OutputError),
}

impl FetchError {
    /// Whether this failure must end the whole job
    pub fn is_auth_exhausted(&self) -> bool {
        matches!(self, FetchError::Platform(e) if e.is_auth_exhausted())
    }
}

/// Result type for a single attachment
pub type FetchResult<T> = Result<T, FetchError>;

/// Outcome of one attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// Written to disk
    Saved {
        /// Final location (may carry a `_N` suffix)
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },
    /// Deliberately not downloaded
    Skipped(SkipReason),
    /// Download or write failed
    Failed(FetchError),
}

/// Downloads the attachments of a message
pub struct AttachmentFetcher {
    platform: Arc<dyn ChatPlatform>,
    guard: TokenRefreshGuard,
    limiter: Arc<RateLimiter>,
}

impl AttachmentFetcher {
    /// Create a fetcher sharing `limiter` with the rest of the job
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        guard: TokenRefreshGuard,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            platform,
            guard,
            limiter,
        }
    }

    /// Save every attachment of `message` into `dest_dir`
    ///
    /// Outcomes are returned in attachment order, one per attachment.
    /// Attachments not reached because of cancellation or an exhausted
    /// session are reported as skipped.
    pub async fn fetch<'m>(
        &self,
        message: &'m Message,
        dest_dir: &Path,
        cancel: &CancelFlag,
    ) -> Vec<(&'m Attachment, AttachmentOutcome)> {
        let mut outcomes = Vec::with_capacity(message.attachments.len());
        let mut halted = false;

        for attachment in &message.attachments {
            if halted {
                let skipped = AttachmentOutcome::Skipped(SkipReason::SessionExhausted);
                outcomes.push((attachment, skipped));
                continue;
            }
            if cancel.is_cancelled() {
                outcomes.push((attachment, AttachmentOutcome::Skipped(SkipReason::Cancelled)));
                continue;
            }

            let outcome = match self.save(attachment, dest_dir).await {
                Ok((path, bytes)) => {
                    debug!(file = %path.display(), bytes, "Saved attachment");
                    metrics::record_attachment_saved(bytes);
                    AttachmentOutcome::Saved { path, bytes }
                }
                Err(e) => {
                    warn!(
                        file = %attachment.filename,
                        message_id = %message.id,
                        error = %e,
                        "Failed to save attachment"
                    );
                    metrics::record_attachment_failed();
                    halted = e.is_auth_exhausted();
                    AttachmentOutcome::Failed(e)
                }
            };
            outcomes.push((attachment, outcome));
        }

        outcomes
    }

    /// Download one attachment to a fresh file in `dest_dir`
    ///
    /// The guard covers the whole download, so a session that expires while
    /// the body is streaming restarts the attachment once from scratch.
    pub async fn save(
        &self,
        attachment: &Attachment,
        dest_dir: &Path,
    ) -> FetchResult<(PathBuf, u64)> {
        ensure_dir(dest_dir).await?;
        let filename = sanitize_component(&attachment.filename);

        let written = self
            .guard
            .call(|| self.attempt(attachment, dest_dir, &filename))
            .await?;
        Ok(written?)
    }

    /// Platform errors are returned in the outer result so the guard sees them
    async fn attempt(
        &self,
        attachment: &Attachment,
        dest_dir: &Path,
        filename: &str,
    ) -> PlatformResult<OutputResult<(PathBuf, u64)>> {
        self.limiter.throttle().await;
        let mut body = self.platform.download(attachment).await?;

        let (path, mut file) = match create_unique(dest_dir, filename).await {
            Ok(created) => created,
            Err(e) => return Ok(Err(e)),
        };

        match write_body(&mut file, &mut body, &path).await {
            Ok(bytes) => Ok(Ok((path, bytes))),
            Err(e) => {
                drop(file);
                discard_partial(&path).await;
                match e {
                    FetchError::Platform(e) => Err(e),
                    FetchError::Output(e) => Ok(Err(e)),
                }
            }
        }
    }
}

async fn write_body(
    file: &mut tokio::fs::File,
    body: &mut ByteStream,
    path: &Path,
) -> FetchResult<u64> {
    let io_err = |e: std::io::Error| {
        FetchError::Output(OutputError::IoError(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )))
    };

    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    Ok(written)
}
