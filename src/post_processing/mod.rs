//! Post-processing pipeline for fetched resources
//!
//! Each resource carries a [`PostProcessor`] that turns the fetched bytes into
//! the bytes stored in the bundle. The pipeline never looks at the payload
//! itself; it calls the processor and wraps any error with the resource path.
//!
//! ## Processors
//!
//! - [`PassThrough`]: store the payload unchanged (metrics exposition text)
//! - [`PprofDecoder`]: decode a pprof profile and re-encode it uncompressed
//! - [`PathRouted`]: pick one of two processors based on the remote path
//!
//! Any `Fn(&[u8], &ResourceMeta) -> Result<Vec<u8>, TransformError>` closure
//! is a processor as well.

use crate::error::{ResourceError, TransformError};
use crate::types::{FetchOutcome, ProcessedOutcome, ResourceMeta};
use tracing::debug;

pub mod pprof;
pub mod profile;
mod routed;

pub use pprof::PprofDecoder;
pub use routed::PathRouted;

/// A pure transformation from fetched bytes to archived bytes
pub trait PostProcessor: Send + Sync {
    /// Transform one payload
    fn process(&self, raw: &[u8], meta: &ResourceMeta<'_>) -> Result<Vec<u8>, TransformError>;

    /// Short name used in logs
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<F> PostProcessor for F
where
    F: Fn(&[u8], &ResourceMeta<'_>) -> Result<Vec<u8>, TransformError> + Send + Sync,
{
    fn process(&self, raw: &[u8], meta: &ResourceMeta<'_>) -> Result<Vec<u8>, TransformError> {
        self(raw, meta)
    }
}

/// Stores the payload unchanged
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

impl PostProcessor for PassThrough {
    fn process(&self, raw: &[u8], _meta: &ResourceMeta<'_>) -> Result<Vec<u8>, TransformError> {
        Ok(raw.to_vec())
    }

    fn name(&self) -> &'static str {
        "pass_through"
    }
}

/// Run the resource's post-processor over a fetch outcome
///
/// Fetch failures pass through untouched; processor failures become
/// [`ResourceError::PostProcess`].
pub fn apply(outcome: FetchOutcome) -> ProcessedOutcome {
    let FetchOutcome { entry, result } = outcome;

    let result = result.and_then(|payload| {
        let meta = payload.meta(&entry.remote_path);
        entry
            .post_process
            .process(&payload.body, &meta)
            .map(|processed| {
                debug!(
                    remote_path = %entry.remote_path,
                    processor = entry.post_process.name(),
                    raw_bytes = payload.body.len(),
                    processed_bytes = processed.len(),
                    "post-processed resource"
                );
                processed
            })
            .map_err(|cause| ResourceError::PostProcess {
                resource: entry.remote_path.clone(),
                cause,
            })
    });

    ProcessedOutcome { entry, result }
}
