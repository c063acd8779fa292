//! Chat-platform interface consumed by the archiver core
//!
//! The platform client (gateway connection, event dispatch, command
//! registration) lives outside this crate. The core only needs the handful of
//! primitives in [`ChatPlatform`].

use crate::{Attachment, ContainerId, Message, MessageId, Thread, UserId};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;

pub mod http;
pub mod mock;

/// Platform errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The session token was rejected; refreshing it may help
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A refresh was attempted and the retried call was still rejected
    #[error("authorization exhausted: {0}")]
    AuthExhausted(String),

    /// The bot lacks permission for the resource
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Resource does not exist (deleted message, channel, attachment)
    #[error("not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status other than the above
    #[error("HTTP error {status}: {message}")]
    Http {
        /// Status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Transport failure
    #[error("network error: {0}")]
    Network(String),

    /// The recipient does not accept direct messages
    #[error("cannot send direct message: {0}")]
    DirectMessageRejected(String),
}

impl PlatformError {
    /// Whether this error is the authorization-failure signal
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PlatformError::Unauthorized(_))
    }

    /// Whether a refresh-and-retry already failed
    pub fn is_auth_exhausted(&self) -> bool {
        matches!(self, PlatformError::AuthExhausted(_))
    }
}

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Lazy sequence of messages from a channel or thread history
pub type MessageStream = Pin<Box<dyn Stream<Item = PlatformResult<Message>> + Send>>;

/// Attachment body delivered in chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = PlatformResult<Bytes>> + Send>>;

/// Direction in which a history is listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOrder {
    /// Most recent message first; the cursor means "strictly older than"
    NewestFirst,
    /// Oldest message first; the cursor means "strictly newer than"
    OldestFirst,
}

/// Primitives the archiver needs from the chat platform
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Identity of the bot account itself (authors stop-marker messages)
    fn bot_user_id(&self) -> UserId;

    /// List messages of a channel or thread
    ///
    /// # Arguments
    /// * `container` - Channel or thread to read
    /// * `order` - Listing direction
    /// * `cursor` - Resume point; messages up to and including it are not returned
    async fn list_messages(
        &self,
        container: ContainerId,
        order: HistoryOrder,
        cursor: Option<MessageId>,
    ) -> PlatformResult<MessageStream>;

    /// List the threads of a channel, active threads first, then archived ones
    async fn list_threads(&self, channel: ContainerId) -> PlatformResult<Vec<Thread>>;

    /// Open a byte stream for an attachment
    ///
    /// Expired credentials surface as [`PlatformError::Unauthorized`], distinct
    /// from transport errors.
    async fn download(&self, attachment: &Attachment) -> PlatformResult<ByteStream>;

    /// Acquire a fresh session token
    async fn refresh_session(&self) -> PlatformResult<()>;

    /// Send a direct message to a user
    async fn send_direct_message(&self, user: UserId, text: &str) -> PlatformResult<()>;
}
