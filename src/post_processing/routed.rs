//! Path-based processor selection

use super::{PassThrough, PostProcessor, PprofDecoder};
use crate::error::TransformError;
use crate::types::ResourceMeta;
use std::sync::Arc;

/// Path prefix served by Go's `net/http/pprof`
pub const PPROF_PATH_PREFIX: &str = "/debug/pprof";

/// Sends profiling paths to one processor and everything else to another
///
/// Used when a single processor is shared by every resource of a bundle that
/// mixes profiles and plain-text metrics.
#[derive(Clone)]
pub struct PathRouted {
    prefix: String,
    matched: Arc<dyn PostProcessor>,
    fallback: Arc<dyn PostProcessor>,
}

impl PathRouted {
    /// Route paths starting with `prefix` to `matched`, the rest to `fallback`
    pub fn new(
        prefix: impl Into<String>,
        matched: Arc<dyn PostProcessor>,
        fallback: Arc<dyn PostProcessor>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            matched,
            fallback,
        }
    }

    /// Decode profiles under `/debug/pprof`, pass everything else through
    pub fn pprof_or_pass_through() -> Self {
        Self::new(
            PPROF_PATH_PREFIX,
            Arc::new(PprofDecoder),
            Arc::new(PassThrough),
        )
    }

    fn select(&self, remote_path: &str) -> &dyn PostProcessor {
        if remote_path.starts_with(&self.prefix) {
            self.matched.as_ref()
        } else {
            self.fallback.as_ref()
        }
    }
}

impl PostProcessor for PathRouted {
    fn process(&self, raw: &[u8], meta: &ResourceMeta<'_>) -> Result<Vec<u8>, TransformError> {
        self.select(meta.remote_path).process(raw, meta)
    }

    fn name(&self) -> &'static str {
        "path_routed"
    }
}
