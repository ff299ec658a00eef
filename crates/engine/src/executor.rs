//! Job executor: claims due jobs, runs the body, finalizes via conditional
//! transitions.
//!
//! The only blocking point is the body itself. Every terminal path writes
//! the result **after** its status transition committed, so a cancellation
//! that wins the transition is authoritative and a stale success can never
//! clobber it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use slated_core::JobId;

use crate::error::{EngineError, EngineResult};
use crate::ledger::{self, StateLedger};
use crate::store::JobStore;
use crate::types::{Job, JobResult, JobStatus, RetryPolicy};

/// Failure raised by a job body. Transient by assumption; retried per
/// policy.
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct BodyError(pub String);

impl BodyError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// The opaque unit of work a job runs. Produces text output or fails.
#[async_trait]
pub trait JobBody: Send + Sync {
    async fn run(&self, job: &Job) -> Result<String, BodyError>;
}

/// Default body: sleeps briefly and reports what ran, mirroring the demo
/// workload of the source system.
#[derive(Debug, Clone)]
pub struct SimulatedJobBody {
    pub delay: Duration,
}

impl Default for SimulatedJobBody {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
        }
    }
}

#[async_trait]
impl JobBody for SimulatedJobBody {
    async fn run(&self, job: &Job) -> Result<String, BodyError> {
        tokio::time::sleep(self.delay).await;

        let mut output = format!(
            "Job executed at {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        output.push_str(&format!("Job name: {}\n", job.name));
        if !job.description.is_empty() {
            output.push_str(&format!("Description: {}\n", job.description));
        }
        output.push_str("Job completed successfully.");
        Ok(output)
    }
}

/// Executes claimed jobs with bounded retry.
pub struct Executor {
    store: Arc<dyn JobStore>,
    ledger: Arc<dyn StateLedger>,
    body: Arc<dyn JobBody>,
    retry: RetryPolicy,
    ledger_ttl: Duration,
}

impl Executor {
    pub fn new(
        store: Arc<dyn JobStore>,
        ledger: Arc<dyn StateLedger>,
        body: Arc<dyn JobBody>,
        retry: RetryPolicy,
        ledger_ttl: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            body,
            retry,
            ledger_ttl,
        }
    }

    /// Run one execution attempt chain for a job.
    ///
    /// Lost conditional transitions (cancelled, duplicate dispatch) are
    /// no-ops, not errors. `NotFound` and `RetriesExhausted` are reported
    /// to the caller; the latter leaves the job `failed` with the last
    /// error as its result.
    pub async fn execute(&self, id: JobId) -> EngineResult<()> {
        let Some(job) = self.store.get(id).await? else {
            error!(job_id = %id, "job not found at dispatch time");
            return Err(EngineError::NotFound(id));
        };

        // Claim. Losing here means another actor already moved the job
        // (cancellation or duplicate dispatch) — the expected race outcome.
        if !self
            .store
            .compare_and_set_status(id, JobStatus::Pending, JobStatus::InProgress)
            .await?
        {
            debug!(job_id = %id, status = %job.status, "job no longer pending; skipping");
            return Ok(());
        }

        ledger::mark_running_best_effort(&*self.ledger, id, self.ledger_ttl).await;
        info!(job_id = %id, name = %job.name, "executing job");

        let outcome = self.run_with_retry(&job).await;
        let finalized = self.finalize(id, outcome).await;

        // Clear on every terminal outcome so stale entries do not linger.
        ledger::clear_best_effort(&*self.ledger, id).await;
        finalized
    }

    /// Run the body, retrying transient failures while the job stays
    /// `in-progress`. Returns the output or the last error with the total
    /// attempt count.
    async fn run_with_retry(&self, job: &Job) -> Result<String, (String, u32)> {
        let mut retries = 0u32;
        loop {
            let attempt = retries + 1;
            match self.body.run(job).await {
                Ok(output) => return Ok(output),
                Err(e) => {
                    warn!(
                        job_id = %job.id,
                        attempt,
                        error = %e,
                        "job body failed"
                    );

                    if !self.retry.should_retry(retries) {
                        return Err((e.0, attempt));
                    }
                    retries += 1;
                    tokio::time::sleep(self.retry.delay_for_retry(retries)).await;

                    // A cancellation may have won while we were backing off;
                    // in that case further attempts are wasted work.
                    match self.store.get(job.id).await {
                        Ok(Some(current)) if current.status == JobStatus::InProgress => {}
                        Ok(_) => {
                            debug!(job_id = %job.id, "job moved during backoff; abandoning retries");
                            return Err((e.0, attempt));
                        }
                        Err(store_err) => {
                            warn!(job_id = %job.id, error = %store_err, "status check failed; retrying anyway");
                        }
                    }
                }
            }
        }
    }

    /// Commit the terminal transition, then (and only then) the result.
    async fn finalize(
        &self,
        id: JobId,
        outcome: Result<String, (String, u32)>,
    ) -> EngineResult<()> {
        match outcome {
            Ok(output) => {
                if self
                    .store
                    .compare_and_set_status(id, JobStatus::InProgress, JobStatus::Completed)
                    .await?
                {
                    self.store.upsert_result(id, JobResult::success(output)).await?;
                    info!(job_id = %id, "job completed");
                } else {
                    // Cancellation won; its terminal state is authoritative
                    // and the success output is discarded.
                    debug!(job_id = %id, "completion lost the race; output discarded");
                }
                Ok(())
            }
            Err((last_error, attempts)) => {
                if self
                    .store
                    .compare_and_set_status(id, JobStatus::InProgress, JobStatus::Failed)
                    .await?
                {
                    self.store
                        .upsert_result(id, JobResult::failure(&last_error))
                        .await?;
                    let exhausted = EngineError::RetriesExhausted {
                        id,
                        attempts,
                        last_error,
                    };
                    error!(job_id = %id, error = %exhausted, "job failed permanently");
                    Err(exhausted)
                } else {
                    debug!(job_id = %id, "failure lost the race; result untouched");
                    Ok(())
                }
            }
        }
    }
}
