//! Hierarchical path generation for the archive tree
//!
//! Files land in `root/{server}/{channel}/` for channels and
//! `root/{server}/{channel}/{thread}/` for threads. Every component is
//! sanitized so platform names can never escape the root or produce names
//! rejected by Windows, Linux or macOS.
//!
//! # Usage Example
//!
//! ```rust
//! use channel_archiver::output::ArchivePathBuilder;
//! use std::path::PathBuf;
//!
//! let dir = ArchivePathBuilder::new(PathBuf::from("downloads"))
//!     .with_server("My Server")
//!     .with_channel("general")
//!     .with_thread(Some("release: v2?"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(dir, PathBuf::from("downloads/My Server/general/release_ v2_"));
//! ```

use super::OutputError;
use crate::Container;
use std::path::{Path, PathBuf};

/// Replacement used when a name sanitizes to nothing
const UNNAMED: &str = "unnamed_file";

/// Path builder for the server/channel/thread hierarchy
#[derive(Debug, Clone)]
pub struct ArchivePathBuilder {
    root_dir: PathBuf,
    server: Option<String>,
    channel: Option<String>,
    thread: Option<String>,
}

impl ArchivePathBuilder {
    /// Create a new path builder rooted at `root_dir`
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            server: None,
            channel: None,
            thread: None,
        }
    }

    /// Builder pre-filled from a container's names
    pub fn for_container(root_dir: &Path, container: &Container) -> Self {
        Self::new(root_dir.to_path_buf())
            .with_server(&container.server_name)
            .with_channel(&container.channel_name)
            .with_thread(container.thread_name.as_deref())
    }

    /// Set the server name
    pub fn with_server(mut self, name: &str) -> Self {
        self.server = Some(sanitize_component(name));
        self
    }

    /// Set the channel name
    pub fn with_channel(mut self, name: &str) -> Self {
        self.channel = Some(sanitize_component(name));
        self
    }

    /// Set the thread name (optional)
    pub fn with_thread(mut self, name: Option<&str>) -> Self {
        self.thread = name.map(sanitize_component);
        self
    }

    /// Build the destination directory
    pub fn build(&self) -> Result<PathBuf, OutputError> {
        let server = self.server.as_ref().ok_or_else(|| {
            OutputError::ConfigurationError("Server name required".to_string())
        })?;
        let channel = self.channel.as_ref().ok_or_else(|| {
            OutputError::ConfigurationError("Channel name required".to_string())
        })?;

        let mut path = self.root_dir.join(server).join(channel);
        if let Some(thread) = &self.thread {
            path.push(thread);
        }
        Ok(path)
    }
}

/// Make a single path component safe for every common filesystem
///
/// Replaces `< > : " / \ | ? *` and control characters with `_`, trims
/// leading and trailing dots and spaces, and falls back to `unnamed_file`
/// when nothing is left.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        UNNAMED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// The `n`th disambiguated variant of `filename`: `photo.png` → `photo_n.png`
pub fn numbered_name(filename: &str, n: u32) -> String {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());

    match path.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    }
}
