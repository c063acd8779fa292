//! Attachment streaming over HTTP
//!
//! Attachment URLs are fetched with one shared `reqwest::Client` so
//! connection pooling works across a whole queue session. Expired signed URLs
//! and rejected tokens come back as 401/403 and are reported as
//! [`PlatformError::Unauthorized`] so the refresh guard can react.

use futures_util::StreamExt;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{ByteStream, PlatformError, PlatformResult};

/// HTTP connect timeout (seconds) - time to establish TCP connection
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Read timeout (seconds) between body chunks; large files may take minutes overall
const HTTP_READ_TIMEOUT_SECS: u64 = 60;

/// HTTP client shared by every attachment download
pub static GLOBAL_HTTP_CLIENT: Lazy<Arc<Client>> = Lazy::new(|| {
    Arc::new(
        Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(HTTP_READ_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                panic!("FATAL: Failed to build HTTP client: {e}. Check system TLS configuration.");
            }),
    )
});

/// Get the shared HTTP client
pub fn global_http_client() -> Arc<Client> {
    GLOBAL_HTTP_CLIENT.clone()
}

/// Streams attachment bodies from their URLs
#[derive(Clone)]
pub struct HttpAttachmentSource {
    client: Arc<Client>,
    bearer: Option<String>,
}

impl HttpAttachmentSource {
    /// Source using the shared client and no credentials
    pub fn new() -> Self {
        Self {
            client: global_http_client(),
            bearer: None,
        }
    }

    /// Source using a specific client
    pub fn with_client(client: Arc<Client>) -> Self {
        Self {
            client,
            bearer: None,
        }
    }

    /// Send `Authorization: Bot <token>` with every request
    pub fn with_bot_token(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(format!("Bot {}", token.into()));
        self
    }

    /// Start streaming `url`
    ///
    /// # Errors
    /// [`PlatformError::Unauthorized`] on 401/403, [`PlatformError::NotFound`]
    /// on 404, [`PlatformError::Http`] on other non-success statuses and
    /// [`PlatformError::Network`] on transport failures.
    pub async fn stream(&self, url: &str) -> PlatformResult<ByteStream> {
        let mut request = self.client.get(url);
        if let Some(bearer) = &self.bearer {
            request = request.header(reqwest::header::AUTHORIZATION, bearer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let status = response.status();
        if let Some(err) = classify_status(status) {
            debug!(url = %url, status = status.as_u16(), "Attachment request rejected");
            return Err(err);
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| PlatformError::Network(e.to_string())));
        Ok(Box::pin(body))
    }
}

impl Default for HttpAttachmentSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a response status to the platform error it signals, if any
pub fn classify_status(status: StatusCode) -> Option<PlatformError> {
    if status.is_success() {
        return None;
    }

    let reason = status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string();

    Some(match status.as_u16() {
        401 | 403 => PlatformError::Unauthorized(format!("HTTP {}: {reason}", status.as_u16())),
        404 => PlatformError::NotFound(reason),
        code => PlatformError::Http {
            status: code,
            message: reason,
        },
    })
}
