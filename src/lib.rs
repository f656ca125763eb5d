//! # promdiag
//!
//! Diagnostic bundle collector for Prometheus-style monitoring servers.
//!
//! A collection run fetches a fixed set of diagnostic endpoints (pprof
//! profiles, the metrics exposition) concurrently, post-processes each
//! payload, and packs the results into a single `tar.gz` bundle.
//!
//! ## Design
//!
//! - **Partial success** - one resource failing never discards the others
//! - **Deterministic** - archive order is declaration order, not completion order
//! - **Atomic output** - a failed run leaves no archive behind
//! - **Pluggable post-processing** - each resource brings its own transformation
//!
//! ## Quick Start
//!
//! ```no_run
//! use promdiag::{Collector, CollectorConfig, presets};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collector = Collector::new(CollectorConfig::default())?;
//!     let result = collector.run(&presets::all("localhost:9090")).await?;
//!
//!     for failure in &result.failures {
//!         eprintln!("{}: {}", failure.remote_path, failure.error);
//!     }
//!     println!("wrote {}", result.archive_path.display());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Bundle archive writing and reading
pub mod archive;
/// Collection orchestrator
pub mod collector;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Resource fetching
pub mod fetcher;
/// Post-processing pipeline
pub mod post_processing;
/// Built-in bundle definitions
pub mod presets;
/// Run reporting
pub mod report;
/// Core types
pub mod types;

// Re-export commonly used types
pub use archive::{ArchiveEntry, BundleArchiver, BundleFile, read_bundle};
pub use collector::Collector;
pub use config::CollectorConfig;
pub use error::{Error, ResourceError, Result, TransformError};
pub use fetcher::ResourceFetcher;
pub use post_processing::{PassThrough, PathRouted, PostProcessor, PprofDecoder};
pub use presets::{DEFAULT_ARCHIVE_NAME, Preset};
pub use report::{RunReport, exit_code};
pub use types::{
    BundleSpec, CollectedResource, FetchOutcome, FetchedPayload, ProcessedOutcome,
    ResourceEntry, ResourceFailure, ResourceMeta, RunOutcome, RunResult,
};
