//! # Channel Archiver Library
//!
//! Core of a personal-use chat bot that archives file attachments from
//! channels and threads to local storage.
//!
//! ## Features
//!
//! - **Single-Job Queue**: Archive requests are serialized, one active job at a time
//! - **Incremental Mode**: Stops at the bot's own last message, archiving only what is new
//! - **Full Mode**: Archives a channel and every active and archived thread
//! - **Rate Limiting**: Minimum delay between consecutive network operations
//! - **Token Refresh**: Expired sessions are refreshed and the failed call retried once
//! - **Completion Notice**: A direct-message summary once the queue drains
//!
//! ## Quick Start
//!
//! ```no_run
//! use channel_archiver::downloader::{ArchiveMode, Job, JobTarget};
//! use channel_archiver::platform::mock::MockPlatform;
//! use channel_archiver::queue::QueueManager;
//! use channel_archiver::{Container, ContainerId, UserId};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let platform = Arc::new(MockPlatform::new(UserId(1)));
//! let queue = QueueManager::builder(platform, UserId(42), "./downloads")
//!     .download_delay(Duration::from_millis(250))
//!     .build();
//!
//! let general = Container::channel(ContainerId(100), "My Server", "general");
//! let job = Job::new(JobTarget::ChannelWithThreads(general), ArchiveMode::Full, UserId(42));
//! queue.enqueue(job)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`platform`] - The chat-platform seam: history listing, thread listing,
//!   attachment streams, session refresh and direct messages
//! - [`downloader`] - Jobs, the execution loops, rate limiting and the token refresh guard
//! - [`queue`] - The queue manager that owns pending jobs and the running slot
//! - [`notify`] - Completion summary composition and delivery
//! - [`output`] - Destination path layout and collision-free file naming
//! - [`bot`] - Owner-facing command layer (authorization and reply text)

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner-facing command layer
pub mod bot;

/// Cooperative cancellation shared between the queue and a running job
pub mod cancel;

/// CLI command implementations
pub mod cli;

/// Runtime configuration
pub mod config;

/// Job execution, rate limiting and session refresh
pub mod downloader;

/// Counters and the optional Prometheus exporter
pub mod metrics;

/// Completion notifications
pub mod notify;

/// Destination tree layout and file writing
pub mod output;

/// External chat-platform interface
pub mod platform;

/// Single-owner download queue
pub mod queue;

pub use downloader::{ArchiveMode, Job, JobStatus, JobTarget};
pub use queue::{QueueError, QueueManager};

/// Platform user identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Platform message identifier.
///
/// Identifiers are time-ordered: a larger id was created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

/// Identifier of a message container (a channel or a thread)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A channel or thread together with the names that place it in the archive tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Container {
    /// Platform identifier of this channel or thread
    pub id: ContainerId,
    /// Server (guild) display name
    pub server_name: String,
    /// Channel display name; for threads, the parent channel's name
    pub channel_name: String,
    /// Thread display name, set only when this container is a thread
    pub thread_name: Option<String>,
}

impl Container {
    /// A top-level text channel
    pub fn channel(
        id: ContainerId,
        server_name: impl Into<String>,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            server_name: server_name.into(),
            channel_name: channel_name.into(),
            thread_name: None,
        }
    }

    /// A thread under `channel_name`
    pub fn thread(
        id: ContainerId,
        server_name: impl Into<String>,
        channel_name: impl Into<String>,
        thread_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            server_name: server_name.into(),
            channel_name: channel_name.into(),
            thread_name: Some(thread_name.into()),
        }
    }

    /// Container for a thread listed under this channel
    pub fn child_thread(&self, thread: &Thread) -> Self {
        Self::thread(
            thread.id,
            self.server_name.clone(),
            self.channel_name.clone(),
            thread.name.clone(),
        )
    }

    /// Whether this container is a thread
    pub fn is_thread(&self) -> bool {
        self.thread_name.is_some()
    }

    /// Name shown to users: the thread name for threads, else the channel name
    pub fn display_name(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(&self.channel_name)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.display_name())
    }
}

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Platform identifier
    pub id: u64,
    /// Original filename as uploaded
    pub filename: String,
    /// Download URL
    pub url: String,
    /// Size in bytes as reported by the platform
    pub size: u64,
}

/// A message from a channel or thread history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier
    pub id: MessageId,
    /// Author of the message
    pub author: UserId,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Attachments in upload order
    pub attachments: Vec<Attachment>,
    /// Link that opens this message in the client
    pub jump_url: String,
}

impl Message {
    /// Whether the message carries at least one attachment
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Whether a thread is currently active or archived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadState {
    /// Listed among the channel's active threads
    Active,
    /// Listed among the channel's archived threads
    Archived,
}

/// Thread belonging to a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    /// Thread identifier (time-ordered like message ids)
    pub id: ContainerId,
    /// Thread display name
    pub name: String,
    /// Active or archived
    pub state: ThreadState,
}
