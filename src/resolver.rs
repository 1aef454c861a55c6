//! Turns template references into canonical absolute paths.

use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PathResolver {
    base_dir: PathBuf,
}

impl PathResolver {
    /// Creates a resolver rooted at `base_dir`, which must exist.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let base_dir = std::fs::canonicalize(base_dir).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound {
                reference: base_dir.display().to_string(),
            },
            _ => Error::IoError(e),
        })?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolves `reference` against the base directory.
    ///
    /// Absolute references are used as they are. The result has symlinks and
    /// `.`/`..` resolved and is guaranteed to name an existing file.
    ///
    /// # Errors
    /// * `Error::NotFound` if nothing (or only a directory) exists there
    pub fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let candidate = Path::new(reference);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        };

        let not_found = || Error::NotFound {
            reference: reference.to_string(),
        };
        let canonical = std::fs::canonicalize(&joined).map_err(|e| match e.kind() {
            ErrorKind::NotFound => not_found(),
            _ => Error::IoError(e),
        })?;
        if !canonical.is_file() {
            return Err(not_found());
        }
        Ok(canonical)
    }
}
