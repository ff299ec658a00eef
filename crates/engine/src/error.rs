//! Engine error taxonomy.
//!
//! Contention errors (`AlreadyTerminal`, `RaceLost`) are normal outcomes
//! under concurrency and are surfaced as declined operations, not system
//! failures. Storage errors propagate; advisory-ledger errors never reach
//! this type (they are logged and swallowed at the call site).

use thiserror::Error;

use slated_core::JobId;

use crate::types::JobStatus;

/// Result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The referenced job does not exist (or is not visible to the caller).
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// `scheduled_time` was not strictly in the future at creation.
    #[error("scheduled time must be in the future")]
    InvalidSchedule,

    /// The job already reached a terminal state.
    #[error("job {0} already finished ({1})")]
    AlreadyTerminal(JobId, JobStatus),

    /// Another actor committed the conditional transition first.
    #[error("job {0}: another actor finalized the job first")]
    RaceLost(JobId),

    /// The job is not cancellable under the configured policy.
    #[error("job {0} is {1} and cannot be cancelled under the current policy")]
    NotCancellable(JobId, JobStatus),

    /// The job is not terminal yet, so no result exists.
    #[error("job {0} has no result yet")]
    NotReady(JobId),

    /// The job body failed (retried per policy).
    #[error("job execution failed: {0}")]
    Execution(String),

    /// The retry bound was reached; the job stays `failed` with the last
    /// error recorded.
    #[error("job {id}: retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        id: JobId,
        attempts: u32,
        last_error: String,
    },

    /// The job store (or another required collaborator) is unavailable.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether this error is expected state-machine contention rather than
    /// a system failure.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            EngineError::AlreadyTerminal(_, _) | EngineError::RaceLost(_)
        )
    }
}
