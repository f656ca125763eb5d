//! Error types for promdiag
//!
//! Errors are split by blast radius:
//! - [`Error`] aborts a whole collection run (bad spec, archive I/O failure)
//! - [`ResourceError`] is isolated to one resource and reported as data in
//!   [`RunResult::failures`](crate::types::RunResult::failures)
//! - [`TransformError`] is what a post-processor returns; the pipeline wraps
//!   it into [`ResourceError::PostProcess`]

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for promdiag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Run-fatal error
///
/// Any of these means no valid bundle was produced.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch_timeout")
        key: Option<String>,
    },

    /// The bundle specification is malformed
    #[error("invalid bundle specification: {0}")]
    InvalidSpec(String),

    /// Two resources map to the same file name inside the archive
    #[error("duplicate archive entry {file_name:?} (from {first} and {second})")]
    DuplicateEntry {
        /// The file name used more than once
        file_name: String,
        /// Remote path of the first resource using the name
        first: String,
        /// Remote path of the conflicting resource
        second: String,
    },

    /// Writing the archive failed; nothing was left at `path`
    #[error("failed to write archive {path}: {source}")]
    Archive {
        /// Final archive path that was being written
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidSpec(_) => "invalid_spec",
            Error::DuplicateEntry { .. } => "duplicate_entry",
            Error::Archive { .. } => "archive_error",
            Error::Io(_) => "io_error",
            Error::HttpClient(_) => "http_client_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}

/// Failure of a single resource
///
/// Never aborts the run. The resource is left out of the archive and the
/// error is recorded alongside its remote path.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Connection failure or timeout
    #[error("network error fetching {url}: {reason}")]
    Network {
        /// Full URL that was requested
        url: String,
        /// Description of the failure
        reason: String,
        /// Whether the request hit the fetch timeout
        timed_out: bool,
    },

    /// Server answered with a non-2xx status
    #[error("HTTP status {code} fetching {url}")]
    HttpStatus {
        /// Full URL that was requested
        url: String,
        /// Response status code
        code: u16,
    },

    /// Response body could not be fully read
    #[error("failed to read response body from {url}: {reason}")]
    Body {
        /// Full URL that was requested
        url: String,
        /// Description of the failure
        reason: String,
    },

    /// The resource's post-processor rejected the payload
    #[error("post-processing {resource} failed: {cause}")]
    PostProcess {
        /// Remote path of the resource
        resource: String,
        /// Error returned by the post-processor
        #[source]
        cause: TransformError,
    },

    /// The fetch worker did not run to completion
    #[error("fetch task failed: {reason}")]
    Task {
        /// Description of the join failure
        reason: String,
    },
}

impl ResourceError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ResourceError::Network {
                timed_out: true, ..
            } => "timeout",
            ResourceError::Network { .. } => "network_error",
            ResourceError::HttpStatus { .. } => "http_status",
            ResourceError::Body { .. } => "body_read_error",
            ResourceError::PostProcess { .. } => "post_process_error",
            ResourceError::Task { .. } => "task_error",
        }
    }

    /// True for failures that happened before a payload was available
    pub fn is_fetch_stage(&self) -> bool {
        !matches!(self, ResourceError::PostProcess { .. })
    }
}

/// Error returned by a post-processor
#[derive(Debug, Error)]
pub enum TransformError {
    /// Payload could not be decompressed
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    /// Payload is not a valid protobuf message
    #[error("decode failed: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Payload decoded but is structurally invalid
    #[error("invalid payload: {0}")]
    Invalid(String),

    /// Any other processor-specific failure
    #[error("{0}")]
    Other(String),
}
