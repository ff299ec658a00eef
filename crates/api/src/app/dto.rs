//! Request/response DTOs and JSON mapping helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use slated_engine::{Job, JobResult, JobStatus};

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub scheduled_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct JobResultResponse {
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl From<JobResult> for JobResultResponse {
    fn from(result: JobResult) -> Self {
        Self {
            output: result.output,
            error_message: result.error_message,
            completed_at: result.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub scheduled_time: DateTime<Utc>,
    pub status: JobStatus,
    /// Embedded once the job is terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResultResponse>,
}

impl JobResponse {
    pub fn from_job(job: Job, result: Option<JobResult>) -> Self {
        Self {
            id: job.id.to_string(),
            name: job.name,
            description: job.description,
            created_at: job.created_at,
            scheduled_time: job.scheduled_time,
            status: job.status,
            result: result.map(Into::into),
        }
    }
}
