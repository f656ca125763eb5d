//! Core types for bundle collection
//!
//! A [`BundleSpec`] describes one collection run. Fetch workers produce
//! [`FetchOutcome`]s, the post-processing pipeline turns them into
//! [`ProcessedOutcome`]s, and the orchestrator folds those into a
//! [`RunResult`].

use crate::error::{Error, ResourceError, Result};
use crate::post_processing::PostProcessor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Metadata handed to a post-processor alongside the raw payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceMeta<'a> {
    /// Path the payload was fetched from
    pub remote_path: &'a str,
    /// Response `Content-Type`, when the server sent one
    pub content_type: Option<&'a str>,
}

/// One fetchable diagnostic item
#[derive(Clone)]
pub struct ResourceEntry {
    /// Path on the server, starting with `/`
    pub remote_path: String,
    /// File name of the payload inside the archive
    pub archive_file_name: String,
    /// Transformation applied to the fetched bytes
    pub post_process: Arc<dyn PostProcessor>,
}

impl ResourceEntry {
    /// Create an entry with its own post-processor
    pub fn new(
        remote_path: impl Into<String>,
        archive_file_name: impl Into<String>,
        post_process: impl PostProcessor + 'static,
    ) -> Self {
        Self::with_shared(remote_path, archive_file_name, Arc::new(post_process))
    }

    /// Create an entry that shares a post-processor with other entries
    pub fn with_shared(
        remote_path: impl Into<String>,
        archive_file_name: impl Into<String>,
        post_process: Arc<dyn PostProcessor>,
    ) -> Self {
        Self {
            remote_path: remote_path.into(),
            archive_file_name: archive_file_name.into(),
            post_process,
        }
    }
}

impl fmt::Debug for ResourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEntry")
            .field("remote_path", &self.remote_path)
            .field("archive_file_name", &self.archive_file_name)
            .field("post_process", &self.post_process.name())
            .finish()
    }
}

/// Description of one collection run
///
/// Resources are kept in a `Vec` because archive order follows declaration
/// order.
#[derive(Clone, Debug)]
pub struct BundleSpec {
    /// Base URL of the target server
    pub server_address: String,
    /// File name of the produced archive
    pub archive_name: String,
    /// Resources to collect, in archive order
    pub resources: Vec<ResourceEntry>,
}

impl BundleSpec {
    /// Create a spec with no resources
    pub fn new(server_address: impl Into<String>, archive_name: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            archive_name: archive_name.into(),
            resources: Vec::new(),
        }
    }

    /// Append a resource
    pub fn with_resource(mut self, entry: ResourceEntry) -> Self {
        self.resources.push(entry);
        self
    }

    /// Check every invariant that can be checked without touching the network
    pub fn validate(&self) -> Result<()> {
        parse_server_address(&self.server_address)?;

        if !is_plain_file_name(&self.archive_name) {
            return Err(Error::InvalidSpec(format!(
                "archive name {:?} must be a non-empty file name",
                self.archive_name
            )));
        }

        for entry in &self.resources {
            if !entry.remote_path.starts_with('/') {
                return Err(Error::InvalidSpec(format!(
                    "remote path {:?} must start with '/'",
                    entry.remote_path
                )));
            }
            if !is_relative_entry_name(&entry.archive_file_name) {
                return Err(Error::InvalidSpec(format!(
                    "archive file name {:?} for {} must be a non-empty relative path",
                    entry.archive_file_name, entry.remote_path
                )));
            }
        }

        check_unique_names(
            self.resources
                .iter()
                .map(|e| (e.archive_file_name.as_str(), e.remote_path.as_str())),
        )
    }
}

/// Parse a server address into a base URL
///
/// Addresses without a scheme are treated as plain HTTP, so `localhost:9090`
/// works the same as `http://localhost:9090`.
pub fn parse_server_address(address: &str) -> Result<Url> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidSpec("server address is empty".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| {
        Error::InvalidSpec(format!("server address {:?} is not a URL: {}", address, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidSpec(format!(
            "server address {:?} uses unsupported scheme {:?}",
            address,
            url.scheme()
        )));
    }
    if url.host().is_none() {
        return Err(Error::InvalidSpec(format!(
            "server address {:?} has no host",
            address
        )));
    }

    Ok(url)
}

/// Fail with [`Error::DuplicateEntry`] if a file name appears twice
///
/// Items are `(file_name, origin)` pairs; the origin is only used in the error.
/// Names are compared the way tar stores them, so `a//b` and `a/b/` collide
/// with `a/b`.
pub(crate) fn check_unique_names<'a>(
    names: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for (file_name, origin) in names {
        if let Some(first) = seen.insert(normalized_entry_name(file_name), origin) {
            return Err(Error::DuplicateEntry {
                file_name: file_name.to_string(),
                first: first.to_string(),
                second: origin.to_string(),
            });
        }
    }
    Ok(())
}

fn normalized_entry_name(name: &str) -> String {
    Path::new(name)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && Path::new(name).file_name().is_some_and(|f| f == name)
}

fn is_relative_entry_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Body and headers of a successful fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedPayload {
    /// Full response body
    pub body: Vec<u8>,
    /// Response `Content-Type` header
    pub content_type: Option<String>,
}

impl FetchedPayload {
    /// Metadata view for post-processors
    pub fn meta<'a>(&'a self, remote_path: &'a str) -> ResourceMeta<'a> {
        ResourceMeta {
            remote_path,
            content_type: self.content_type.as_deref(),
        }
    }
}

/// Result of fetching one resource
#[derive(Debug)]
pub struct FetchOutcome {
    /// The resource that was fetched
    pub entry: ResourceEntry,
    /// Raw payload, or why the fetch failed
    pub result: std::result::Result<FetchedPayload, ResourceError>,
}

/// Result of post-processing one fetched resource
#[derive(Debug)]
pub struct ProcessedOutcome {
    /// The resource that was processed
    pub entry: ResourceEntry,
    /// Bytes to archive, or why the resource was dropped
    pub result: std::result::Result<Vec<u8>, ResourceError>,
}

/// A resource that made it into the archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CollectedResource {
    /// Index of the resource in [`BundleSpec::resources`]
    pub position: usize,
    /// Path the payload was fetched from
    pub remote_path: String,
    /// Name of the payload inside the archive
    pub archive_file_name: String,
    /// Size of the archived payload
    pub bytes: usize,
}

/// A resource that was left out of the archive
#[derive(Debug)]
pub struct ResourceFailure {
    /// Index of the resource in [`BundleSpec::resources`]
    pub position: usize,
    /// Path the resource was fetched from
    pub remote_path: String,
    /// What went wrong
    pub error: ResourceError,
}

/// Overall outcome of a run that produced an archive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every resource is in the archive
    Complete,
    /// The archive is missing at least one resource
    Partial,
}

/// Result of a collection run that produced an archive
///
/// A run that could not produce an archive returns an [`Error`] instead, so
/// holding a `RunResult` means `archive_path` points at a valid bundle.
#[derive(Debug)]
pub struct RunResult {
    /// Where the archive was written
    pub archive_path: PathBuf,
    /// Archived resources, in declaration order
    pub collected: Vec<CollectedResource>,
    /// Dropped resources, in declaration order
    pub failures: Vec<ResourceFailure>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunResult {
    /// Complete if nothing failed, partial otherwise
    pub fn outcome(&self) -> RunOutcome {
        if self.failures.is_empty() {
            RunOutcome::Complete
        } else {
            RunOutcome::Partial
        }
    }
}
