//! Owner-scoped read access to jobs, results, and the status summary.

use std::sync::Arc;

use tracing::error;

use slated_core::{JobId, OwnerId};

use crate::error::{EngineError, EngineResult};
use crate::store::{JobStore, JobSummary};
use crate::types::{Job, JobResult};

/// Thin read facade over the job store. Non-blocking beyond storage I/O.
pub struct QueryFacade {
    store: Arc<dyn JobStore>,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Fetch a job, visible only to its owner.
    pub async fn get_job(&self, id: JobId, requester: OwnerId) -> EngineResult<Job> {
        let job = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        if job.owner != requester {
            return Err(EngineError::NotFound(id));
        }
        Ok(job)
    }

    /// Fetch the terminal result of a job.
    ///
    /// `NotReady` until the job is terminal. A terminal job without a
    /// result row is a data-integrity violation (the engine writes the
    /// result right after the terminal transition), reported as `NotFound`.
    pub async fn get_result(&self, id: JobId, requester: OwnerId) -> EngineResult<JobResult> {
        let job = self.get_job(id, requester).await?;
        if !job.status.is_terminal() {
            return Err(EngineError::NotReady(id));
        }
        match self.store.get_result(id).await? {
            Some(result) => Ok(result),
            None => {
                error!(job_id = %id, status = %job.status, "terminal job has no result row");
                Err(EngineError::NotFound(id))
            }
        }
    }

    /// All of the requester's jobs, newest first.
    pub async fn list_jobs(&self, requester: OwnerId) -> EngineResult<Vec<Job>> {
        self.store.list_for_owner(requester).await
    }

    /// Count per status, including zero buckets.
    pub async fn summarize_by_status(&self, requester: OwnerId) -> EngineResult<JobSummary> {
        self.store.count_by_status(requester).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::InMemoryJobStore;
    use crate::types::JobStatus;

    async fn setup() -> (Arc<InMemoryJobStore>, QueryFacade, JobId, OwnerId) {
        let store = Arc::new(InMemoryJobStore::new());
        let facade = QueryFacade::new(store.clone());
        let owner = OwnerId::new();
        let job = Job::new(
            owner,
            "report",
            "",
            Utc::now() + chrono::Duration::seconds(5),
        )
        .unwrap();
        let id = store.create(job).await.unwrap();
        (store, facade, id, owner)
    }

    #[tokio::test]
    async fn get_job_is_owner_scoped() {
        let (_store, facade, id, owner) = setup().await;

        assert_eq!(facade.get_job(id, owner).await.unwrap().id, id);
        let err = facade.get_job(id, OwnerId::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn result_of_non_terminal_job_is_not_ready() {
        let (_store, facade, id, owner) = setup().await;

        let err = facade.get_result(id, owner).await.unwrap_err();
        assert!(matches!(err, EngineError::NotReady(_)));
    }

    #[tokio::test]
    async fn result_of_completed_job_is_returned() {
        let (store, facade, id, owner) = setup().await;
        store
            .compare_and_set_status(id, JobStatus::Pending, JobStatus::InProgress)
            .await
            .unwrap();
        store
            .compare_and_set_status(id, JobStatus::InProgress, JobStatus::Completed)
            .await
            .unwrap();
        store
            .upsert_result(id, JobResult::success("done"))
            .await
            .unwrap();

        let result = facade.get_result(id, owner).await.unwrap();
        assert_eq!(result.output.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn terminal_job_without_result_row_is_reported_missing() {
        let (store, facade, id, owner) = setup().await;
        store
            .compare_and_set_status(id, JobStatus::Pending, JobStatus::Failed)
            .await
            .unwrap();

        let err = facade.get_result(id, owner).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
