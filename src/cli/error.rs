//! CLI error types and conversions

use crate::config::ConfigError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Metrics exporter could not start
    #[error("metrics error: {0}")]
    MetricsError(String),

    /// Report could not be rendered
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
