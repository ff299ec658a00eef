//! Job storage seam and the in-memory implementation.
//!
//! `compare_and_set_status` is the sole state-transition primitive: every
//! component uses it instead of unconditional writes, so races between the
//! executor and a cancellation resolve deterministically at the store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Serialize;

use slated_core::{JobId, OwnerId};

use crate::error::{EngineError, EngineResult};
use crate::types::{Job, JobResult, JobStatus};

/// Durable source of truth for jobs and their results.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job (status `pending`).
    async fn create(&self, job: Job) -> EngineResult<JobId>;

    /// Fetch a job by id.
    async fn get(&self, id: JobId) -> EngineResult<Option<Job>>;

    /// Atomically set `status = next` iff the current status equals
    /// `expected` **and** the edge is a legal state-machine transition.
    ///
    /// Returns `false` when the update did not commit (wrong current
    /// status, terminal `expected`, or missing row) — that is how callers
    /// detect a lost race.
    async fn compare_and_set_status(
        &self,
        id: JobId,
        expected: JobStatus,
        next: JobStatus,
    ) -> EngineResult<bool>;

    /// Create-or-replace the single result row for a job.
    async fn upsert_result(&self, id: JobId, result: JobResult) -> EngineResult<()>;

    /// Fetch the result row for a job, if any.
    async fn get_result(&self, id: JobId) -> EngineResult<Option<JobResult>>;

    /// All jobs belonging to an owner, newest first.
    async fn list_for_owner(&self, owner: OwnerId) -> EngineResult<Vec<Job>>;

    /// Per-status counts for an owner (zero buckets included).
    async fn count_by_status(&self, owner: OwnerId) -> EngineResult<JobSummary>;
}

/// Per-status job counts for one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub pending: usize,
    #[serde(rename = "in-progress")]
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobSummary {
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::InProgress => self.in_progress += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}

/// In-memory job store for tests/dev.
///
/// The CAS guarantee holds because status reads and writes happen under a
/// single write lock.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    results: RwLock<HashMap<JobId, JobResult>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: Job) -> EngineResult<JobId> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(EngineError::storage(format!("job already exists: {}", job.id)));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    async fn get(&self, id: JobId) -> EngineResult<Option<Job>> {
        let jobs = self.jobs.read().unwrap();
        Ok(jobs.get(&id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: JobId,
        expected: JobStatus,
        next: JobStatus,
    ) -> EngineResult<bool> {
        if !expected.permits(next) {
            return Ok(false);
        }
        let mut jobs = self.jobs.write().unwrap();
        match jobs.get_mut(&id) {
            Some(job) if job.status == expected => {
                job.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn upsert_result(&self, id: JobId, result: JobResult) -> EngineResult<()> {
        let mut results = self.results.write().unwrap();
        results.insert(id, result);
        Ok(())
    }

    async fn get_result(&self, id: JobId) -> EngineResult<Option<JobResult>> {
        let results = self.results.read().unwrap();
        Ok(results.get(&id).cloned())
    }

    async fn list_for_owner(&self, owner: OwnerId) -> EngineResult<Vec<Job>> {
        let jobs = self.jobs.read().unwrap();
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| j.owner == owner)
            .cloned()
            .collect();
        result.sort_by_key(|j| std::cmp::Reverse(j.created_at));
        Ok(result)
    }

    async fn count_by_status(&self, owner: OwnerId) -> EngineResult<JobSummary> {
        let jobs = self.jobs.read().unwrap();
        let mut summary = JobSummary::default();
        for job in jobs.values().filter(|j| j.owner == owner) {
            summary.record(job.status);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn pending_job(owner: OwnerId) -> Job {
        Job::new(
            owner,
            "report",
            "nightly report",
            Utc::now() + chrono::Duration::seconds(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn cas_succeeds_only_when_expected_matches() {
        let store = InMemoryJobStore::new();
        let owner = OwnerId::new();
        let id = store.create(pending_job(owner)).await.unwrap();

        // Wrong expectation does not commit.
        assert!(!store
            .compare_and_set_status(id, JobStatus::InProgress, JobStatus::Completed)
            .await
            .unwrap());
        assert_eq!(store.get(id).await.unwrap().unwrap().status, JobStatus::Pending);

        assert!(store
            .compare_and_set_status(id, JobStatus::Pending, JobStatus::InProgress)
            .await
            .unwrap());
        assert_eq!(
            store.get(id).await.unwrap().unwrap().status,
            JobStatus::InProgress
        );
    }

    #[tokio::test]
    async fn cas_with_terminal_expected_always_fails() {
        let store = InMemoryJobStore::new();
        let owner = OwnerId::new();
        let id = store.create(pending_job(owner)).await.unwrap();

        store
            .compare_and_set_status(id, JobStatus::Pending, JobStatus::InProgress)
            .await
            .unwrap();
        store
            .compare_and_set_status(id, JobStatus::InProgress, JobStatus::Completed)
            .await
            .unwrap();

        for next in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert!(!store
                .compare_and_set_status(id, JobStatus::Completed, next)
                .await
                .unwrap());
        }
        assert_eq!(
            store.get(id).await.unwrap().unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn cas_on_missing_job_is_a_lost_race_not_an_error() {
        let store = InMemoryJobStore::new();
        assert!(!store
            .compare_and_set_status(JobId::new(), JobStatus::Pending, JobStatus::InProgress)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn upsert_result_replaces_rather_than_appends() {
        let store = InMemoryJobStore::new();
        let owner = OwnerId::new();
        let id = store.create(pending_job(owner)).await.unwrap();

        store
            .upsert_result(id, JobResult::failure("transient"))
            .await
            .unwrap();
        store
            .upsert_result(id, JobResult::success("done"))
            .await
            .unwrap();

        let result = store.get_result(id).await.unwrap().unwrap();
        assert_eq!(result.output.as_deref(), Some("done"));
        assert_eq!(result.error_message, None);
    }

    #[tokio::test]
    async fn count_by_status_is_owner_scoped_with_zero_buckets() {
        let store = InMemoryJobStore::new();
        let owner = OwnerId::new();
        let other = OwnerId::new();

        let a = store.create(pending_job(owner)).await.unwrap();
        let b = store.create(pending_job(owner)).await.unwrap();
        store.create(pending_job(other)).await.unwrap();

        store
            .compare_and_set_status(a, JobStatus::Pending, JobStatus::InProgress)
            .await
            .unwrap();
        store
            .compare_and_set_status(a, JobStatus::InProgress, JobStatus::Completed)
            .await
            .unwrap();
        store
            .compare_and_set_status(b, JobStatus::Pending, JobStatus::InProgress)
            .await
            .unwrap();

        let summary = store.count_by_status(owner).await.unwrap();
        assert_eq!(
            summary,
            JobSummary {
                pending: 0,
                in_progress: 1,
                completed: 1,
                failed: 0,
            }
        );
    }

    #[tokio::test]
    async fn list_for_owner_is_newest_first() {
        let store = InMemoryJobStore::new();
        let owner = OwnerId::new();

        let first = store.create(pending_job(owner)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.create(pending_job(owner)).await.unwrap();

        let jobs = store.list_for_owner(owner).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, second);
        assert_eq!(jobs[1].id, first);
    }
}
