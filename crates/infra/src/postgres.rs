//! Postgres-backed job store.
//!
//! The conditional status transition is a single-row conditional UPDATE —
//! the database decides the race, never application-side read-then-write.
//!
//! ## Error Mapping
//!
//! All SQLx errors map to `EngineError::Storage` with the failing
//! operation named; a lost conditional transition is **not** an error, it
//! is `Ok(false)` (`rows_affected == 0`).
//!
//! ## Thread Safety
//!
//! `PostgresJobStore` is `Send + Sync`; the SQLx pool handles connection
//! management across tasks.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use slated_core::{JobId, OwnerId};
use slated_engine::{EngineError, EngineResult, Job, JobResult, JobStatus, JobStore, JobSummary};

/// Durable job store on PostgreSQL (`jobs` + `job_results` tables).
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `jobs` / `job_results` tables if they do not exist.
    pub async fn ensure_schema(&self) -> EngineResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id             UUID PRIMARY KEY,
                owner_id       UUID NOT NULL,
                name           TEXT NOT NULL,
                description    TEXT NOT NULL,
                created_at     TIMESTAMPTZ NOT NULL,
                scheduled_time TIMESTAMPTZ NOT NULL,
                status         TEXT NOT NULL
                    CHECK (status IN ('pending', 'in-progress', 'completed', 'failed'))
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS jobs_owner_idx ON jobs (owner_id, created_at DESC)",
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_results (
                job_id        UUID PRIMARY KEY REFERENCES jobs (id) ON DELETE CASCADE,
                output        TEXT,
                error_message TEXT,
                completed_at  TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn create(&self, job: Job) -> EngineResult<JobId> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, owner_id, name, description, created_at, scheduled_time, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.owner.as_uuid())
        .bind(&job.name)
        .bind(&job.description)
        .bind(job.created_at)
        .bind(job.scheduled_time)
        .bind(job.status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create", e))?;

        Ok(job.id)
    }

    async fn get(&self, id: JobId) -> EngineResult<Option<Job>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, name, description, created_at, scheduled_time, status
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.map(|r| job_from_row(&r)).transpose()
    }

    async fn compare_and_set_status(
        &self,
        id: JobId,
        expected: JobStatus,
        next: JobStatus,
    ) -> EngineResult<bool> {
        // Illegal edges (including anything out of a terminal state) never
        // reach the database.
        if !expected.permits(next) {
            return Ok(false);
        }

        let result = sqlx::query("UPDATE jobs SET status = $1 WHERE id = $2 AND status = $3")
            .bind(next.as_str())
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("compare_and_set_status", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn upsert_result(&self, id: JobId, result: JobResult) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO job_results (job_id, output, error_message, completed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_id) DO UPDATE SET
                output = EXCLUDED.output,
                error_message = EXCLUDED.error_message,
                completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(&result.output)
        .bind(&result.error_message)
        .bind(result.completed_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_result", e))?;

        Ok(())
    }

    async fn get_result(&self, id: JobId) -> EngineResult<Option<JobResult>> {
        let row = sqlx::query(
            "SELECT output, error_message, completed_at FROM job_results WHERE job_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_result", e))?;

        Ok(row.map(|r| JobResult {
            output: r.get("output"),
            error_message: r.get("error_message"),
            completed_at: r.get::<DateTime<Utc>, _>("completed_at"),
        }))
    }

    async fn list_for_owner(&self, owner: OwnerId) -> EngineResult<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, name, description, created_at, scheduled_time, status
            FROM jobs
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_for_owner", e))?;

        rows.iter().map(job_from_row).collect()
    }

    async fn count_by_status(&self, owner: OwnerId) -> EngineResult<JobSummary> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM jobs WHERE owner_id = $1 GROUP BY status",
        )
        .bind(owner.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_by_status", e))?;

        let mut summary = JobSummary::default();
        for row in rows {
            let status = parse_status(row.get("status"))?;
            let count = row.get::<i64, _>("count").max(0) as usize;
            match status {
                JobStatus::Pending => summary.pending += count,
                JobStatus::InProgress => summary.in_progress += count,
                JobStatus::Completed => summary.completed += count,
                JobStatus::Failed => summary.failed += count,
            }
        }
        Ok(summary)
    }
}

fn job_from_row(row: &sqlx::postgres::PgRow) -> EngineResult<Job> {
    Ok(Job {
        id: JobId::from_uuid(row.get("id")),
        owner: OwnerId::from_uuid(row.get("owner_id")),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        scheduled_time: row.get::<DateTime<Utc>, _>("scheduled_time"),
        status: parse_status(row.get("status"))?,
    })
}

fn parse_status(raw: &str) -> EngineResult<JobStatus> {
    JobStatus::parse(raw)
        .ok_or_else(|| EngineError::storage(format!("unknown status in jobs table: {raw}")))
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> EngineError {
    EngineError::storage(format!("{operation}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_a_storage_error() {
        let err = parse_status("paused").unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
    }
}
