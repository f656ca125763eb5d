//! Built-in bundle definitions
//!
//! The three bundles the `debug` command knows about: profiles only, metrics
//! only, and both together.

use crate::post_processing::{PassThrough, PathRouted, PostProcessor, PprofDecoder};
use crate::types::{BundleSpec, ResourceEntry};
use std::sync::Arc;

/// Archive name used when none is given
pub const DEFAULT_ARCHIVE_NAME: &str = "debug.tar.gz";

/// Profiling endpoints and their file names inside the bundle
pub const PPROF_RESOURCES: [(&str, &str); 5] = [
    ("/debug/pprof/block", "block.pb"),
    ("/debug/pprof/goroutine", "goroutine.pb"),
    ("/debug/pprof/heap", "heap.pb"),
    ("/debug/pprof/mutex", "mutex.pb"),
    ("/debug/pprof/threadcreate", "threadcreate.pb"),
];

/// Metrics endpoint and its file name inside the bundle
pub const METRICS_RESOURCE: (&str, &str) = ("/metrics", "metrics.txt");

/// Which built-in bundle to collect
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// Profiling data only
    Pprof,
    /// Metrics exposition only
    Metrics,
    /// Profiling data and metrics
    All,
}

impl Preset {
    /// Build the bundle spec for `server`
    pub fn spec(self, server: &str) -> BundleSpec {
        match self {
            Preset::Pprof => pprof(server),
            Preset::Metrics => metrics(server),
            Preset::All => all(server),
        }
    }
}

/// Profiling resources, each decoded as a pprof profile
pub fn pprof(server: &str) -> BundleSpec {
    let decoder: Arc<dyn PostProcessor> = Arc::new(PprofDecoder);
    with_entries(server, PPROF_RESOURCES.iter().copied(), decoder)
}

/// The metrics endpoint, stored as-is
pub fn metrics(server: &str) -> BundleSpec {
    let pass_through: Arc<dyn PostProcessor> = Arc::new(PassThrough);
    with_entries(server, [METRICS_RESOURCE], pass_through)
}

/// Profiles followed by metrics, sharing one path-routed processor
pub fn all(server: &str) -> BundleSpec {
    let routed: Arc<dyn PostProcessor> = Arc::new(PathRouted::pprof_or_pass_through());
    with_entries(
        server,
        PPROF_RESOURCES
            .iter()
            .copied()
            .chain(std::iter::once(METRICS_RESOURCE)),
        routed,
    )
}

fn with_entries<'a>(
    server: &str,
    resources: impl IntoIterator<Item = (&'a str, &'a str)>,
    post_process: Arc<dyn PostProcessor>,
) -> BundleSpec {
    resources
        .into_iter()
        .fold(BundleSpec::new(server, DEFAULT_ARCHIVE_NAME), |spec, (path, name)| {
            spec.with_resource(ResourceEntry::with_shared(
                path,
                name,
                Arc::clone(&post_process),
            ))
        })
}
