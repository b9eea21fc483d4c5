//! Error types for the Platter search pipeline.
//!
//! Errors are split by where they surface: configuration at startup, artifact
//! loading at startup, and the per-query pipeline. None of them are retried
//! inside the core; every failure is deterministic for a given input.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Platter operations.
#[derive(Error, Debug)]
pub enum PlatterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Artifact bundle could not be loaded
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Query pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A background loading task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failures while loading the artifact bundle.
///
/// Any of these means the process must not serve queries.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// An artifact file is missing
    #[error("Artifact not found: {0}")]
    NotFound(PathBuf),

    /// An artifact file exists but cannot be parsed
    #[error("Corrupt artifact {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// The manifest declares a format this build does not understand
    #[error("Unsupported {what} version {found} (supported: {supported})")]
    UnsupportedVersion {
        what: &'static str,
        found: u32,
        supported: u32,
    },

    /// Two artifacts disagree on a shape or count
    #[error("Inconsistent artifacts: {0}")]
    Consistency(String),
}

/// Per-query pipeline errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Uploaded bytes are not a usable image
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// A stage produced a vector of the wrong length
    #[error("Shape mismatch in {stage} stage: expected {expected} components, got {actual}")]
    ShapeMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The index returned an id the catalog does not cover
    #[error("Catalog lookup failed: id {id} not in catalog of {catalog_len} entries")]
    CatalogLookup { id: usize, catalog_len: usize },

    /// The embedding runtime failed
    #[error("Embedding failed: {message}")]
    Embedding { message: String },

    /// The request itself is malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The blocking search worker panicked or was cancelled
    #[error("Search worker failed: {message}")]
    Worker { message: String },

    /// Search exceeded its deadline
    #[error("Search timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Convenience type alias for Platter results.
pub type Result<T> = std::result::Result<T, PlatterError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
