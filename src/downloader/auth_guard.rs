//! Refresh-and-retry-once policy for operations that may hit an expired session.
//!
//! Wrapped operations report expiry as [`PlatformError::Unauthorized`]. The
//! guard then asks the platform for a fresh session and runs the operation one
//! more time. A second authorization failure, or a failed refresh, becomes
//! [`PlatformError::AuthExhausted`], which the executor treats as fatal for
//! the job. Every other error passes through untouched.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::metrics;
use crate::platform::{ChatPlatform, PlatformError, PlatformResult};

/// Token refresh guard bound to a platform session
#[derive(Clone)]
pub struct TokenRefreshGuard {
    platform: Arc<dyn ChatPlatform>,
}

impl TokenRefreshGuard {
    /// Create a guard that refreshes sessions through `platform`
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self { platform }
    }

    /// Run `op`, refreshing the session and retrying exactly once on an
    /// authorization failure
    pub async fn call<T, F, Fut>(&self, mut op: F) -> PlatformResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PlatformResult<T>>,
    {
        match op().await {
            Err(first) if first.is_unauthorized() => {
                warn!(error = %first, "Authorization failed, refreshing session");
                self.refresh().await?;
                match op().await {
                    Err(second) if second.is_unauthorized() => {
                        warn!(error = %second, "Authorization failed again after refresh");
                        Err(PlatformError::AuthExhausted(second.to_string()))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Acquire a fresh session
    ///
    /// A failed refresh is reported as [`PlatformError::AuthExhausted`]: there is
    /// nothing left to retry with.
    pub async fn refresh(&self) -> PlatformResult<()> {
        metrics::record_token_refresh();
        match self.platform.refresh_session().await {
            Ok(()) => {
                info!("Session refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                Err(PlatformError::AuthExhausted(format!(
                    "session refresh failed: {e}"
                )))
            }
        }
    }
}

/// Wrap an operation so every call goes through `guard`
///
/// The returned closure has the same shape as `op` (no arguments, resolves to
/// a [`PlatformResult`]), so it can be handed to any code expecting the
/// unwrapped operation.
pub fn with_token_refresh<T, F, Fut>(
    guard: TokenRefreshGuard,
    op: F,
) -> impl Fn() -> BoxFuture<'static, PlatformResult<T>> + Send + Sync
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = PlatformResult<T>> + Send + 'static,
    T: Send + 'static,
{
    move || {
        let guard = guard.clone();
        let op = op.clone();
        Box::pin(async move { guard.call(op).await })
    }
}
