//! User-initiated cancellation, racing the executor.
//!
//! Cancellation is advisory once the body has started: it cannot preempt
//! an in-flight body, only win the subsequent status transition. Whichever
//! conditional transition the store commits first is authoritative.

use std::sync::Arc;

use tracing::{debug, info};

use slated_core::{JobId, OwnerId};

use crate::error::{EngineError, EngineResult};
use crate::ledger::{self, StateLedger};
use crate::store::JobStore;
use crate::types::{JobResult, JobStatus};

/// Error message recorded for a cancelled job.
pub const CANCELLED_BY_USER: &str = "Cancelled by user";

/// Which jobs a user may cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// Only `pending` jobs are cancellable.
    #[default]
    PendingOnly,
    /// `in-progress` jobs may also be cancelled by racing the executor's
    /// terminal transition.
    AllowInProgress,
}

/// Handles cancel requests against pending or in-flight jobs.
pub struct CancellationHandler {
    store: Arc<dyn JobStore>,
    ledger: Arc<dyn StateLedger>,
    policy: CancelPolicy,
}

impl CancellationHandler {
    pub fn new(
        store: Arc<dyn JobStore>,
        ledger: Arc<dyn StateLedger>,
        policy: CancelPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            policy,
        }
    }

    /// Cancel a job on behalf of its owner.
    ///
    /// Declined operations are distinct errors: `AlreadyTerminal` when the
    /// job finished before the request, `RaceLost` when another actor
    /// committed the terminal transition first, `NotCancellable` when the
    /// policy forbids cancelling a running job.
    pub async fn cancel(&self, id: JobId, requester: OwnerId) -> EngineResult<()> {
        let job = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;

        // Owner scoping: do not reveal other owners' jobs.
        if job.owner != requester {
            return Err(EngineError::NotFound(id));
        }

        let outcome = match job.status {
            JobStatus::Completed | JobStatus::Failed => {
                Err(EngineError::AlreadyTerminal(id, job.status))
            }
            JobStatus::Pending => self.finalize_cancel(id, JobStatus::Pending).await,
            JobStatus::InProgress => match self.policy {
                CancelPolicy::PendingOnly => {
                    Err(EngineError::NotCancellable(id, JobStatus::InProgress))
                }
                CancelPolicy::AllowInProgress => {
                    // Advisory only: the ledger tells us whether a body is
                    // believed in flight, the store still decides the race.
                    match self.ledger.is_running(id).await {
                        Ok(running) => {
                            debug!(job_id = %id, ledger_running = running, "racing in-progress job")
                        }
                        Err(e) => debug!(job_id = %id, error = %e, "ledger unavailable; racing anyway"),
                    }
                    self.finalize_cancel(id, JobStatus::InProgress).await
                }
            },
        };

        // Clear the advisory entry regardless of outcome; the executor
        // clears again on its own exit.
        ledger::clear_best_effort(&*self.ledger, id).await;
        outcome
    }

    /// Win the conditional transition first, then write the result.
    async fn finalize_cancel(&self, id: JobId, expected: JobStatus) -> EngineResult<()> {
        if self
            .store
            .compare_and_set_status(id, expected, JobStatus::Failed)
            .await?
        {
            self.store
                .upsert_result(id, JobResult::failure(CANCELLED_BY_USER))
                .await?;
            info!(job_id = %id, "job cancelled by user");
            Ok(())
        } else {
            debug!(job_id = %id, "cancellation lost the race");
            Err(EngineError::RaceLost(id))
        }
    }
}
