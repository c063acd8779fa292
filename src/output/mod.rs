//! Archive tree layout and file writing

pub mod file;
pub mod path;

pub use file::{create_unique, discard_partial, ensure_dir};
pub use path::{numbered_name, sanitize_component, ArchivePathBuilder};

/// Output errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Path could not be built from the given parts
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Every numbered variant of a filename is already taken
    #[error("no free filename for {0}")]
    NameExhausted(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
