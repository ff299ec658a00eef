//! Core job types and retry policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use slated_core::{JobId, OwnerId};

use crate::error::EngineError;

/// A unit of user-submitted, time-scheduled work.
///
/// Everything except `status` is immutable after creation; `status` is
/// mutated exclusively by the engine through conditional transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner: OwnerId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub scheduled_time: DateTime<Utc>,
    pub status: JobStatus,
}

impl Job {
    /// Create a new pending job.
    ///
    /// `scheduled_time` must be strictly in the future; otherwise no job is
    /// created and `InvalidSchedule` is returned.
    pub fn new(
        owner: OwnerId,
        name: impl Into<String>,
        description: impl Into<String>,
        scheduled_time: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let now = Utc::now();
        if scheduled_time <= now {
            return Err(EngineError::InvalidSchedule);
        }
        Ok(Self {
            id: JobId::new(),
            owner,
            name: name.into(),
            description: description.into(),
            created_at: now,
            scheduled_time,
            status: JobStatus::Pending,
        })
    }
}

/// Job execution status.
///
/// Wire names are kebab-case (`pending`, `in-progress`, `completed`,
/// `failed`). `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    /// Waiting for its scheduled instant
    Pending,
    /// Claimed by the executor; the body may be running
    InProgress,
    /// Terminal: the body produced output
    Completed,
    /// Terminal: the body failed permanently, or the user cancelled
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal state-machine edge.
    ///
    /// Terminal states permit nothing; a conditional transition with a
    /// terminal `expected` must always fail so callers can detect lost
    /// races.
    pub fn permits(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in-progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "in-progress" => Some(JobStatus::InProgress),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome record for a job.
///
/// Exists iff the job is terminal; a later terminal write replaces any
/// earlier one (covers the retry-then-success and cancel-race cases).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Present only on a successful run
    pub output: Option<String>,
    /// Present only on a failed or cancelled run
    pub error_message: Option<String>,
    /// When this terminal record was written
    pub completed_at: DateTime<Utc>,
}

impl JobResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            error_message: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            output: None,
            error_message: Some(error_message.into()),
            completed_at: Utc::now(),
        }
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^attempt
    Exponential,
    /// Linear backoff: base * attempt
    Linear,
}

/// Retry policy for the executor.
///
/// Retry state lives here, not in any dispatch framework, so it is
/// inspectable and testable on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first run (0 = no retries)
    pub max_retries: u32,
    /// Base delay between attempts
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    /// Up to 3 retries, fixed 60 s apart.
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(60))
    }
}

impl RetryPolicy {
    /// A policy with no retries.
    pub fn no_retry() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// A policy with fixed delays.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// A policy with exponential backoff.
    pub fn exponential(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Delay before the given retry (1-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => {
                let exp = 2_f64.powi((retry - 1) as i32);
                (base_ms * exp).min(max_ms)
            }
            BackoffStrategy::Linear => (base_ms * retry as f64).min(max_ms),
        };

        Duration::from_millis(delay_ms as u64)
    }

    /// Whether another retry is allowed after `retries_so_far` retries.
    pub fn should_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }
}
