// crates/types/src/job.rs
//! Job lifecycle types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// Opaque unique job identifier (a UUID v4 in canonical hyphenated form).
pub type JobId = String;

/// What the worker is asked to retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../frontend/src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// The whole media resource.
    FullRetrieval,
    /// A `[start, end)` clip of the resource, offsets in seconds.
    RangeRetrieval,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FullRetrieval => "full_retrieval",
            JobKind::RangeRetrieval => "range_retrieval",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_retrieval" => Ok(JobKind::FullRetrieval),
            "range_retrieval" => Ok(JobKind::RangeRetrieval),
            other => Err(UnknownVariant {
                kind: "job kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Status of a job.
///
/// Transitions are monotonic: `Pending -> Processing -> {Completed | Failed}`.
/// A job that never reaches an executor may also go `Pending -> Failed`.
/// Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../frontend/src/types/generated/"))]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// States a job may be in immediately before entering `self`.
    pub fn predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Processing => &[JobStatus::Pending],
            JobStatus::Completed => &[JobStatus::Processing],
            JobStatus::Failed => &[JobStatus::Pending, JobStatus::Processing],
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.predecessors().contains(self)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownVariant {
                kind: "job status",
                value: other.to_string(),
            }),
        }
    }
}

/// Returned when a persisted string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Validated clip range in whole seconds. `end_secs > start_secs` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRange {
    pub start_secs: u64,
    pub end_secs: u64,
}

impl ClipRange {
    pub fn duration_secs(&self) -> u64 {
        self.end_secs.saturating_sub(self.start_secs)
    }
}

/// Worker invocation parameters persisted alongside the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParams {
    /// Normalized source URL (scheme defaulted, whitespace trimmed).
    pub url: String,
    /// Present for `RangeRetrieval` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ClipRange>,
}

impl JobParams {
    pub fn full(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            range: None,
        }
    }

    pub fn range(url: impl Into<String>, range: ClipRange) -> Self {
        Self {
            url: url.into(),
            range: Some(range),
        }
    }
}

/// A job as held by the status store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub params: JobParams,
    pub status: JobStatus,
    pub message: Option<String>,
    pub output_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A fresh `Pending` record.
    pub fn pending(id: JobId, kind: JobKind, params: JobParams) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            params,
            status: JobStatus::Pending,
            message: None,
            output_location: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            message: self.message.clone(),
            output_location: self.output_location.clone(),
        }
    }
}

/// A status write issued by the task executor (or by the supervisor when
/// a job can no longer run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub message: Option<String>,
    pub output_location: Option<String>,
}

impl JobUpdate {
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            message: None,
            output_location: None,
        }
    }

    pub fn completed(output_location: Option<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            message: None,
            output_location,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            message: Some(message.into()),
            output_location: None,
        }
    }
}

/// Point-in-time view of a job, as returned to clients and emitted on the
/// status stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../frontend/src/types/generated/"))]
pub struct StatusSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub output_location: Option<String>,
}
