//! Job record queries.

use chrono::{DateTime, Utc};
use clipper_types::{ClipRange, JobKind, JobParams, JobRecord, JobStatus, JobUpdate};

use crate::{Database, DbError, DbResult};

/// Message written to jobs that were still running when the process died.
pub const INTERRUPTED_MESSAGE: &str = "interrupted by service restart";

type JobRow = (
    String,
    String,
    String,
    Option<i64>,
    Option<i64>,
    String,
    Option<String>,
    Option<String>,
    i64,
    i64,
);

const SELECT_JOB: &str = "SELECT id, kind, url, start_secs, end_secs, status, message, \
     output_location, created_at, updated_at FROM jobs WHERE id = ?";

/// Result of a guarded status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Rejected { current: JobStatus },
    Missing,
}

impl Database {
    pub async fn insert_job(&self, record: &JobRecord) -> DbResult<()> {
        let (start, end) = match record.params.range {
            Some(r) => (Some(r.start_secs as i64), Some(r.end_secs as i64)),
            None => (None, None),
        };
        sqlx::query(
            "INSERT INTO jobs (id, kind, url, start_secs, end_secs, status, message, \
             output_location, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(record.kind.as_str())
        .bind(&record.params.url)
        .bind(start)
        .bind(end)
        .bind(record.status.as_str())
        .bind(&record.message)
        .bind(&record.output_location)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_job(&self, id: &str) -> DbResult<Option<JobRecord>> {
        let row: Option<JobRow> = sqlx::query_as(SELECT_JOB)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(row_to_record).transpose()
    }

    /// Write `update` only if the job's current status is a legal predecessor
    /// of the new one. The check lives in the UPDATE's WHERE clause, so
    /// concurrent writers cannot both succeed.
    pub async fn transition_job(&self, id: &str, update: &JobUpdate) -> DbResult<Transition> {
        let allowed = update.status.predecessors();
        if !allowed.is_empty() {
            let placeholders = vec!["?"; allowed.len()].join(", ");
            let sql = format!(
                "UPDATE jobs SET status = ?, message = ?, output_location = ?, updated_at = ? \
                 WHERE id = ? AND status IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql)
                .bind(update.status.as_str())
                .bind(&update.message)
                .bind(&update.output_location)
                .bind(Utc::now().timestamp_millis())
                .bind(id);
            for status in allowed {
                query = query.bind(status.as_str());
            }
            let result = query.execute(self.pool()).await?;
            if result.rows_affected() == 1 {
                return Ok(Transition::Applied);
            }
        }

        // Nothing written: tell a missing row from an illegal transition.
        let current: Option<(String,)> = sqlx::query_as("SELECT status FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        match current {
            None => Ok(Transition::Missing),
            Some((status,)) => Ok(Transition::Rejected {
                current: parse_status(id, &status)?,
            }),
        }
    }

    /// Fail every job left non-terminal by a previous process. Jobs are not
    /// resumed across restarts. Returns the number of jobs touched.
    pub async fn fail_interrupted_jobs(&self) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed', message = ?, updated_at = ? \
             WHERE status IN ('pending', 'processing')",
        )
        .bind(INTERRUPTED_MESSAGE)
        .bind(Utc::now().timestamp_millis())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}

fn parse_status(id: &str, raw: &str) -> DbResult<JobStatus> {
    raw.parse().map_err(|e: clipper_types::UnknownVariant| DbError::InvalidRow {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn row_to_record(row: JobRow) -> DbResult<JobRecord> {
    let (id, kind, url, start, end, status, message, output_location, created_at, updated_at) = row;

    let kind: JobKind = kind.parse().map_err(|e: clipper_types::UnknownVariant| DbError::InvalidRow {
        id: id.clone(),
        reason: e.to_string(),
    })?;
    let status = parse_status(&id, &status)?;

    let range = match (start, end) {
        (Some(s), Some(e)) if s >= 0 && e > s => Some(ClipRange {
            start_secs: s as u64,
            end_secs: e as u64,
        }),
        (None, None) => None,
        _ => {
            return Err(DbError::InvalidRow {
                id,
                reason: format!("bad clip range {start:?}..{end:?}"),
            })
        }
    };

    Ok(JobRecord {
        id,
        kind,
        params: JobParams { url, range },
        status,
        message,
        output_location,
        created_at: millis_to_datetime(created_at),
        updated_at: millis_to_datetime(updated_at),
    })
}
