//! Run reporting
//!
//! Turns the outcome of [`Collector::run`](crate::Collector::run) into
//! something an operator can read, plus the process exit code.

use crate::error::Error;
use crate::types::{RunOutcome, RunResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

/// Exit code for a run where every resource was collected
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for a partial bundle or a failed run
pub const EXIT_FAILURE: u8 = 1;

/// Status of one resource in a report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Stored in the archive
    Ok,
    /// Left out of the archive
    Failed,
}

/// Per-resource line of a report
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    /// Path the resource was fetched from
    pub remote_path: String,
    /// Whether it made it into the archive
    pub status: ResourceStatus,
    /// Name inside the archive, for collected resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_file_name: Option<String>,
    /// Archived size, for collected resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    /// Machine-readable error code, for failed resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    /// Error message, for failed resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fatal error section of a report
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FatalReport {
    /// Machine-readable error code
    pub code: &'static str,
    /// Error message
    pub message: String,
}

/// Serializable summary of a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// `complete`, `partial` or `failed`
    pub outcome: &'static str,
    /// Archive path; absent when the run failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
    /// Run start time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Run duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    /// Every resource, in declaration order
    pub resources: Vec<ResourceReport>,
    /// The error that aborted the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FatalReport>,
}

impl RunReport {
    /// Build a report from a run's outcome
    pub fn from_outcome(outcome: &Result<RunResult, Error>) -> Self {
        match outcome {
            Ok(result) => Self::from_result(result),
            Err(e) => Self {
                outcome: "failed",
                archive: None,
                started_at: None,
                elapsed_ms: None,
                resources: Vec::new(),
                error: Some(FatalReport {
                    code: e.error_code(),
                    message: e.to_string(),
                }),
            },
        }
    }

    fn from_result(result: &RunResult) -> Self {
        let collected = result.collected.iter().map(|c| {
            (
                c.position,
                ResourceReport {
                    remote_path: c.remote_path.clone(),
                    status: ResourceStatus::Ok,
                    archive_file_name: Some(c.archive_file_name.clone()),
                    bytes: Some(c.bytes),
                    error_code: None,
                    error: None,
                },
            )
        });
        let failed = result.failures.iter().map(|f| {
            (
                f.position,
                ResourceReport {
                    remote_path: f.remote_path.clone(),
                    status: ResourceStatus::Failed,
                    archive_file_name: None,
                    bytes: None,
                    error_code: Some(f.error.error_code()),
                    error: Some(f.error.to_string()),
                },
            )
        });

        let mut resources: Vec<_> = collected.chain(failed).collect();
        resources.sort_by_key(|(position, _)| *position);

        Self {
            outcome: match result.outcome() {
                RunOutcome::Complete => "complete",
                RunOutcome::Partial => "partial",
            },
            archive: Some(result.archive_path.display().to_string()),
            started_at: Some(result.started_at),
            elapsed_ms: Some(u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX)),
            resources: resources.into_iter().map(|(_, r)| r).collect(),
            error: None,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable text, one line per resource
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        if let Some(error) = &self.error {
            let _ = writeln!(out, "error: {}", error.message);
            return out;
        }

        for resource in &self.resources {
            match resource.status {
                ResourceStatus::Ok => {
                    let _ = writeln!(
                        out,
                        "ok      {} -> {} ({} bytes)",
                        resource.remote_path,
                        resource.archive_file_name.as_deref().unwrap_or(""),
                        resource.bytes.unwrap_or(0)
                    );
                }
                ResourceStatus::Failed => {
                    let _ = writeln!(
                        out,
                        "FAILED  {}: {}",
                        resource.remote_path,
                        resource.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        }

        if let Some(archive) = &self.archive {
            let failed = self
                .resources
                .iter()
                .filter(|r| r.status == ResourceStatus::Failed)
                .count();
            if failed == 0 {
                let _ = writeln!(out, "wrote {}", archive);
            } else {
                let _ = writeln!(
                    out,
                    "wrote partial bundle {} ({} of {} resources missing)",
                    archive,
                    failed,
                    self.resources.len()
                );
            }
        }

        out
    }
}

/// Process exit code for a run's outcome
pub fn exit_code(outcome: &Result<RunResult, Error>) -> u8 {
    match outcome {
        Ok(result) if result.outcome() == RunOutcome::Complete => EXIT_SUCCESS,
        _ => EXIT_FAILURE,
    }
}
