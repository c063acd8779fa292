//! Runtime configuration
//!
//! Values come from CLI flags, the process environment, or a `.env` file
//! loaded by the binary with `dotenvy`, in that order of precedence. Loading
//! is lenient: an unparsable delay falls back to the default and an
//! unparsable approved-user list is ignored, both with a warning.
//! [`ArchiverConfig::validate`] then rejects what cannot work.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::downloader::config::{delay_from_secs, DEFAULT_DOWNLOAD_DELAY_MS};
use crate::UserId;

/// Default archive root
pub const DEFAULT_DOWNLOAD_DIRECTORY: &str = "./downloads";

/// Token value shipped in the sample `.env`
pub const PLACEHOLDER_TOKEN: &str = "your_bot_token_here";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// No bot token given
    #[error("DISCORD_TOKEN is not set; add the bot token to .env or the environment")]
    MissingToken,

    /// The sample token was left in place
    #[error("DISCORD_TOKEN still holds the placeholder value; replace it with the real bot token")]
    PlaceholderToken,

    /// No owner given
    #[error("OWNER_ID is not set; add your user id to restrict access and receive notifications")]
    MissingOwner,

    /// Owner id is not a number
    #[error("OWNER_ID must be a numeric user id, got {0:?}")]
    InvalidOwner(String),

    /// Negative delay
    #[error("DOWNLOAD_DELAY must not be negative, got {0}")]
    NegativeDelay(f64),

    /// Download directory could not be created
    #[error("cannot create download directory {path}: {reason}")]
    DownloadDirectory {
        /// Directory that was requested
        path: PathBuf,
        /// IO error description
        reason: String,
    },
}

/// Raw configuration values as read from flags or environment
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    /// `DISCORD_TOKEN`
    pub token: Option<String>,
    /// `DOWNLOAD_DIRECTORY`
    pub download_dir: Option<PathBuf>,
    /// `DOWNLOAD_DELAY`, seconds
    pub download_delay: Option<String>,
    /// `OWNER_ID`
    pub owner_id: Option<String>,
    /// `APPROVED_USERS`, comma-separated
    pub approved_users: Option<String>,
}

impl RawConfig {
    /// Read every variable through `lookup` (e.g. `std::env::var`)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            token: lookup("DISCORD_TOKEN"),
            download_dir: lookup("DOWNLOAD_DIRECTORY").map(PathBuf::from),
            download_delay: lookup("DOWNLOAD_DELAY"),
            owner_id: lookup("OWNER_ID"),
            approved_users: lookup("APPROVED_USERS"),
        }
    }
}

/// Archiver configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiverConfig {
    /// Bot token
    pub token: Option<String>,
    /// Archive root
    pub download_dir: PathBuf,
    /// Delay between network operations, in seconds
    pub download_delay_secs: f64,
    /// Raw owner id as given
    pub owner_id: Option<String>,
    /// Users besides the owner who may issue commands
    pub approved_users: Vec<UserId>,
}

impl ArchiverConfig {
    /// Parse raw values, falling back to defaults where they are unusable
    pub fn load(raw: RawConfig) -> Self {
        Self {
            token: raw.token.filter(|t| !t.trim().is_empty()),
            download_dir: raw
                .download_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIRECTORY)),
            download_delay_secs: parse_delay(raw.download_delay.as_deref()),
            owner_id: raw.owner_id.filter(|o| !o.trim().is_empty()),
            approved_users: parse_approved_users(raw.approved_users.as_deref()),
        }
    }

    /// Check the configuration can run a bot
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.token.as_deref() {
            None => return Err(ConfigError::MissingToken),
            Some(PLACEHOLDER_TOKEN) => return Err(ConfigError::PlaceholderToken),
            Some(_) => {}
        }
        self.owner()?;
        if self.download_delay_secs < 0.0 {
            return Err(ConfigError::NegativeDelay(self.download_delay_secs));
        }
        Ok(())
    }

    /// Create the download directory
    pub fn ensure_download_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.download_dir).map_err(|e| ConfigError::DownloadDirectory {
            path: self.download_dir.clone(),
            reason: e.to_string(),
        })
    }

    /// Validate, create the download directory and log the effective values
    pub fn prepare(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.ensure_download_dir()?;

        info!(
            download_dir = %absolute(&self.download_dir).display(),
            download_delay_secs = self.download_delay_secs,
            owner_id = self.owner_id.as_deref().unwrap_or_default(),
            approved_users = self.approved_users.len(),
            "Configuration loaded"
        );
        Ok(())
    }

    /// Parsed owner id
    pub fn owner(&self) -> Result<UserId, ConfigError> {
        let raw = self.owner_id.as_deref().ok_or(ConfigError::MissingOwner)?;
        raw.trim()
            .parse::<u64>()
            .map(UserId)
            .map_err(|_| ConfigError::InvalidOwner(raw.to_string()))
    }

    /// Delay as a [`Duration`]; negative values map to zero
    pub fn download_delay(&self) -> Duration {
        delay_from_secs(self.download_delay_secs).unwrap_or(Duration::ZERO)
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Parse `DOWNLOAD_DELAY`; anything that is not a number yields the default
pub fn parse_delay(raw: Option<&str>) -> f64 {
    let default = DEFAULT_DOWNLOAD_DELAY_MS as f64 / 1000.0;
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() => secs,
        _ => {
            warn!(value = raw, default, "Invalid DOWNLOAD_DELAY, using default");
            default
        }
    }
}

/// Parse `APPROVED_USERS`; one bad entry discards the whole list
pub fn parse_approved_users(raw: Option<&str>) -> Vec<UserId> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let parsed: Result<Vec<UserId>, _> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse::<u64>().map(UserId))
        .collect();

    parsed.unwrap_or_else(|_| {
        warn!(
            value = raw,
            "Invalid APPROVED_USERS format (expected comma-separated ids), ignoring"
        );
        Vec::new()
    })
}
