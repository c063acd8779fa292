//! Thread enumeration for channel-with-threads jobs

use std::sync::Arc;
use tracing::{debug, info};

use super::auth_guard::TokenRefreshGuard;
use super::rate_limit::RateLimiter;
use crate::platform::{ChatPlatform, PlatformResult};
use crate::{Container, ContainerId, MessageId, ThreadState};

/// Threads selected for archiving, in platform order (active, then archived)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSet {
    /// Containers to scan
    pub threads: Vec<Container>,
    /// Threads created at or before the incremental marker
    pub skipped: usize,
    /// How many of `threads` are archived
    pub archived: usize,
}

impl IntoIterator for ThreadSet {
    type Item = Container;
    type IntoIter = std::vec::IntoIter<Container>;

    fn into_iter(self) -> Self::IntoIter {
        self.threads.into_iter()
    }
}

/// Lists the threads of a channel
pub struct ThreadEnumerator {
    platform: Arc<dyn ChatPlatform>,
    guard: TokenRefreshGuard,
    limiter: Arc<RateLimiter>,
}

impl ThreadEnumerator {
    /// Create an enumerator sharing `limiter` with the rest of the job
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

    /// Threads of `channel`, active and archived
    ///
    /// With `newer_than` set, threads whose id is not greater than the marker
    /// are left out: thread ids are time-ordered, so they were created before
    /// the previous archive run.
    pub async fn enumerate(
        &self,
        channel: &Container,
        newer_than: Option<MessageId>,
    ) -> PlatformResult<ThreadSet> {
        let channel_id: ContainerId = channel.id;
        let listed = self
            .guard
            .call(move || async move {
                self.limiter.throttle().await;
                self.platform.list_threads(channel_id).await
            })
            .await?;

        let mut set = ThreadSet::default();
        for thread in listed {
            if let Some(marker) = newer_than {
                if thread.id.0 <= marker.0 {
                    debug!(thread = %thread.name, "Thread predates marker, skipping");
                    set.skipped += 1;
                    continue;
                }
            }
            if thread.state == ThreadState::Archived {
                set.archived += 1;
            }
            set.threads.push(channel.child_thread(&thread));
        }

        info!(
            channel = %channel,
            threads = set.threads.len(),
            archived = set.archived,
            skipped = set.skipped,
            "Enumerated threads"
        );
        Ok(set)
    }
}
