//! Collection orchestrator
//!
//! Drives one run end to end:
//! 1. Validate the spec (no network I/O if it is malformed)
//! 2. Spawn one fetch task per resource
//! 3. As fetches settle, run each resource's post-processor
//! 4. Put survivors back in declaration order and write the archive
//!
//! Fetch tasks only return their outcome; all bookkeeping happens here, on
//! the orchestrating task.

use crate::archive::{ArchiveEntry, BundleArchiver};
use crate::config::CollectorConfig;
use crate::error::{Error, ResourceError, Result};
use crate::fetcher::ResourceFetcher;
use crate::post_processing;
use crate::types::{BundleSpec, CollectedResource, FetchOutcome, ResourceFailure, RunResult};
use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::time::Instant;
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// Collects diagnostic bundles
#[derive(Clone, Debug)]
pub struct Collector {
    config: CollectorConfig,
}

impl Collector {
    /// Create a collector, validating the configuration
    pub fn new(config: CollectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Run one collection
    ///
    /// Returns `Ok` whenever an archive was written, even if some resources
    /// failed; those are listed in [`RunResult::failures`]. Returns `Err` when
    /// the spec is invalid or the archive could not be written, in which case
    /// no archive exists at the destination.
    pub async fn run(&self, spec: &BundleSpec) -> Result<RunResult> {
        spec.validate()?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let archive_path = self.config.output_dir.join(&spec.archive_name);
        let fetcher = ResourceFetcher::new(&self.config, &spec.server_address)?;

        info!(
            server = %spec.server_address,
            resources = spec.resources.len(),
            archive = ?archive_path,
            "starting bundle collection"
        );

        let mut pending: FuturesUnordered<_> = spec
            .resources
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let fetcher = fetcher.clone();
                let remote_path = entry.remote_path.clone();
                let handle = tokio::spawn(async move { fetcher.fetch(&remote_path).await });
                async move { (position, handle.await) }
            })
            .collect();

        let mut settled: Vec<Option<std::result::Result<Vec<u8>, ResourceError>>> =
            spec.resources.iter().map(|_| None).collect();

        while let Some((position, joined)) = pending.next().await {
            let entry = &spec.resources[position];
            let result = joined.unwrap_or_else(|e| {
                Err(ResourceError::Task {
                    reason: e.to_string(),
                })
            });

            let processed = post_processing::apply(FetchOutcome {
                entry: entry.clone(),
                result,
            });
            settled[position] = Some(processed.result);
        }

        let mut entries = Vec::new();
        let mut collected = Vec::new();
        let mut failures = Vec::new();

        for (position, (entry, outcome)) in spec.resources.iter().zip(settled).enumerate() {
            let outcome = outcome.unwrap_or_else(|| {
                Err(ResourceError::Task {
                    reason: "fetch task never reported back".to_string(),
                })
            });

            match outcome {
                Ok(data) => {
                    collected.push(CollectedResource {
                        position,
                        remote_path: entry.remote_path.clone(),
                        archive_file_name: entry.archive_file_name.clone(),
                        bytes: data.len(),
                    });
                    entries.push(ArchiveEntry {
                        file_name: entry.archive_file_name.clone(),
                        origin: entry.remote_path.clone(),
                        data,
                    });
                }
                Err(error) => {
                    warn!(
                        remote_path = %entry.remote_path,
                        error = %error,
                        "resource left out of bundle"
                    );
                    failures.push(ResourceFailure {
                        position,
                        remote_path: entry.remote_path.clone(),
                        error,
                    });
                }
            }
        }

        let archiver = BundleArchiver::new(archive_path.clone())
            .with_mtime(u64::try_from(started_at.timestamp()).unwrap_or(0));

        let written = tokio::task::spawn_blocking(move || archiver.write(&entries))
            .await
            .map_err(|e| Error::Archive {
                path: archive_path.clone(),
                source: std::io::Error::other(format!("archive task failed: {}", e)),
            })
            .and_then(|r| r);

        if let Err(e) = written {
            // Fatal errors are reported by the caller
            debug!(archive = ?archive_path, error = %e, "bundle collection failed");
            return Err(e);
        }

        let result = RunResult {
            archive_path,
            collected,
            failures,
            started_at,
            elapsed: clock.elapsed(),
        };

        info!(
            archive = ?result.archive_path,
            collected = result.collected.len(),
            failed = result.failures.len(),
            elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            "bundle collection finished"
        );

        Ok(result)
    }
}
