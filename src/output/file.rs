//! Collision-free file creation inside the archive tree

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tracing::{debug, warn};

use super::path::numbered_name;
use super::{OutputError, OutputResult};

/// Upper bound on `_N` suffixes tried before giving up on a filename
const MAX_NAME_SUFFIX: u32 = 10_000;

/// Create `dir` and any missing parents. Succeeds if it already exists.
pub async fn ensure_dir(dir: &Path) -> OutputResult<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        OutputError::IoError(format!(
            "Failed to create directory {}: {}",
            dir.display(),
            e
        ))
    })
}

/// Create a new file named `filename` in `dir` without touching existing files
///
/// When the name is taken, `_1`, `_2`, … are tried before the extension. The
/// file is opened with `create_new`, so two writers can never claim the
/// same name.
pub async fn create_unique(dir: &Path, filename: &str) -> OutputResult<(PathBuf, File)> {
    for n in 0..=MAX_NAME_SUFFIX {
        let name = if n == 0 {
            filename.to_string()
        } else {
            numbered_name(filename, n)
        };
        let candidate = dir.join(&name);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => {
                if n > 0 {
                    debug!(
                        original = %filename,
                        saved_as = %name,
                        "Filename taken, using numbered variant"
                    );
                }
                return Ok((candidate, file));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(OutputError::IoError(format!(
                    "Failed to create {}: {}",
                    candidate.display(),
                    e
                )))
            }
        }
    }

    Err(OutputError::NameExhausted(filename.to_string()))
}

/// Remove a partially written file
pub async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial file"),
    }
}
