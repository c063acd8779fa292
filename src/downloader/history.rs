//! Message history reader that survives session expiry
//!
//! Opening a history goes through the rate limiter and the
//! [`TokenRefreshGuard`]. A listing can also be rejected halfway through,
//! after some messages were delivered. In that case the reader refreshes the
//! session and reopens the listing from the last message it handed out, so no
//! message is yielded twice or skipped. The reopen bypasses the guard: the
//! session was just refreshed, so a rejected reopen, or a reopened listing
//! rejected before producing a single message, ends the reader with
//! [`PlatformError::AuthExhausted`].

use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::auth_guard::TokenRefreshGuard;
use super::rate_limit::RateLimiter;
use crate::platform::{ChatPlatform, HistoryOrder, MessageStream, PlatformError, PlatformResult};
use crate::{ContainerId, Message, MessageId};

struct HistorySource {
    platform: Arc<dyn ChatPlatform>,
    guard: TokenRefreshGuard,
    limiter: Arc<RateLimiter>,
    container: ContainerId,
    order: HistoryOrder,
}

impl HistorySource {
    async fn open(&self, cursor: Option<MessageId>) -> PlatformResult<MessageStream> {
        debug!(container = %self.container, cursor = ?cursor, "Opening history");
        self.guard
            .call(move || async move {
                self.limiter.throttle().await;
                self.platform
                    .list_messages(self.container, self.order, cursor)
                    .await
            })
            .await
    }

    /// Reopen after a mid-stream refresh, without a second refresh
    async fn reopen(&self, cursor: Option<MessageId>) -> PlatformResult<MessageStream> {
        debug!(container = %self.container, cursor = ?cursor, "Reopening history");
        self.limiter.throttle().await;
        self.platform
            .list_messages(self.container, self.order, cursor)
            .await
            .map_err(|e| match e {
                PlatformError::Unauthorized(msg) => PlatformError::AuthExhausted(msg),
                other => other,
            })
    }
}

/// Pull-based reader over one channel or thread history
pub struct HistoryReader {
    source: HistorySource,
    cursor: Option<MessageId>,
    stream: Option<MessageStream>,
    refreshed_without_progress: bool,
    finished: bool,
}

impl HistoryReader {
    /// Reader over `container`, listed in `order`
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        guard: TokenRefreshGuard,
        limiter: Arc<RateLimiter>,
        container: ContainerId,
        order: HistoryOrder,
    ) -> Self {
        Self {
            source: HistorySource {
                platform,
                guard,
                limiter,
                container,
                order,
            },
            cursor: None,
            stream: None,
            refreshed_without_progress: false,
            finished: false,
        }
    }

    /// Id of the last message handed out
    pub fn cursor(&self) -> Option<MessageId> {
        self.cursor
    }

    /// Next message, `None` once the history is exhausted
    ///
    /// After an error is returned the reader is finished.
    pub async fn next(&mut self) -> Option<PlatformResult<Message>> {
        loop {
            if self.finished {
                return None;
            }

            if self.stream.is_none() {
                let opened = if self.refreshed_without_progress {
                    self.source.reopen(self.cursor).await
                } else {
                    self.source.open(self.cursor).await
                };
                match opened {
                    Ok(stream) => self.stream = Some(stream),
                    Err(e) => return self.finish_with(e),
                }
            }
            let Some(stream) = self.stream.as_mut() else {
                return None;
            };

            match stream.next().await {
                Some(Ok(message)) => {
                    self.cursor = Some(message.id);
                    self.refreshed_without_progress = false;
                    return Some(Ok(message));
                }
                Some(Err(e)) if e.is_unauthorized() => {
                    self.stream = None;
                    if self.refreshed_without_progress {
                        warn!(
                            container = %self.source.container,
                            error = %e,
                            "History rejected again after refresh"
                        );
                        return self.finish_with(PlatformError::AuthExhausted(e.to_string()));
                    }

                    warn!(
                        container = %self.source.container,
                        cursor = ?self.cursor,
                        "Session expired mid-listing, refreshing and resuming"
                    );
                    self.refreshed_without_progress = true;
                    if let Err(refresh_err) = self.source.guard.refresh().await {
                        return self.finish_with(refresh_err);
                    }
                }
                Some(Err(e)) => return self.finish_with(e),
                None => {
                    self.finished = true;
                    self.stream = None;
                    return None;
                }
            }
        }
    }

    fn finish_with(&mut self, error: PlatformError) -> Option<PlatformResult<Message>> {
        self.finished = true;
        self.stream = None;
        Some(Err(error))
    }
}
