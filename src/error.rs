//! Error handling for sectional.
//! Defines the error taxonomy and result alias used throughout the crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while resolving, compiling, caching or rendering templates.
///
/// `CorruptCache` is reported by the artifact store when a sidecar cannot be
/// read back; the pipeline recovers from it by recompiling and never hands it
/// to callers.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// A template reference does not point at an existing file
    #[error("Could not find template file '{reference}'")]
    NotFound { reference: String },

    /// An `@include` target could not be resolved
    #[error("Could not find included template file '{target}' (included in {})", includer.display())]
    IncludeNotFound { target: String, includer: PathBuf },

    /// A section was requested that the compiled artifact does not carry
    #[error("No template section named '{name}' found in {}", source_path.display())]
    SectionNotFound { name: String, source_path: PathBuf },

    /// A sidecar exists but cannot be decoded
    #[error("Corrupt cache entry {}: {reason}", path.display())]
    CorruptCache { path: PathBuf, reason: String },

    /// A directive line is missing a mandatory argument
    #[error("Invalid directive at {}:{line}: {message}", path.display())]
    InvalidDirective {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Sidecar serialization failures
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Failures raised by the section executor, with cache paths rewritten
    #[error("Render error: {0}")]
    RenderError(String),

    /// Represents errors that occur during configuration parsing or processing
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The Error to handle
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{}", err);
    std::process::exit(1);
}
