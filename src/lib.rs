//! sectional parses template files into independently renderable sections
//! and caches the compiled result on disk, keyed by source modification time.
//! Cached artifacts are trusted only after every template they include has
//! been checked for changes too.

/// Compiled template metadata and section bodies
pub mod artifact;

/// Command-line interface module for the sectional binary
pub mod cli;

/// Configuration handling
/// Supports JSON and YAML formats (sectional.json, sectional.yml, sectional.yaml)
pub mod config;

/// Directive parsing and include merging
pub mod compiler;

/// Error types and handling
pub mod error;

/// Logger setup for the binary
pub mod logger;

/// In-memory and on-disk cache orchestration
pub mod pipeline;

/// Section executors
pub mod renderer;

/// Template reference resolution
pub mod resolver;

/// `@` directive scanning
pub mod scanner;

/// Cache directory layout, sidecars and section bodies
pub mod store;

/// Template handle
pub mod template;

/// Cache freshness checks
pub mod validator;
