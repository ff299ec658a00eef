//! Engine composition root: wires store, ledger, scheduler, executor,
//! cancellation, and queries behind one front door.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use slated_core::{JobId, OwnerId};

use crate::cancel::{CancelPolicy, CancellationHandler};
use crate::error::EngineResult;
use crate::executor::{Executor, JobBody};
use crate::ledger::StateLedger;
use crate::query::QueryFacade;
use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
use crate::store::{JobStore, JobSummary};
use crate::types::{Job, JobResult, RetryPolicy};

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Dispatch slack added after `scheduled_time`
    pub grace: Duration,
    /// Executor retry policy
    pub retry: RetryPolicy,
    /// TTL for advisory ledger entries
    pub ledger_ttl: Duration,
    /// Whether in-progress jobs are cancellable
    pub cancel_policy: CancelPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            ledger_ttl: Duration::from_secs(600),
            cancel_policy: CancelPolicy::default(),
        }
    }
}

/// The job lifecycle engine.
///
/// Assumes an already-authenticated, already-verified caller identity
/// supplied by the boundary layer; it performs no identity logic itself.
pub struct JobEngine {
    store: Arc<dyn JobStore>,
    scheduler: Scheduler,
    cancellation: CancellationHandler,
    query: QueryFacade,
}

impl JobEngine {
    /// Wire an engine onto the given store/ledger/body and start its
    /// dispatcher loop. The returned handle shuts the loop down.
    pub fn spawn(
        store: Arc<dyn JobStore>,
        ledger: Arc<dyn StateLedger>,
        body: Arc<dyn JobBody>,
        settings: EngineSettings,
    ) -> (Arc<JobEngine>, SchedulerHandle) {
        let executor = Arc::new(Executor::new(
            store.clone(),
            ledger.clone(),
            body,
            settings.retry.clone(),
            settings.ledger_ttl,
        ));
        let (scheduler, handle) = Scheduler::spawn(
            executor,
            SchedulerConfig {
                grace: settings.grace,
                ..SchedulerConfig::default()
            },
        );

        let engine = Arc::new(JobEngine {
            store: store.clone(),
            scheduler,
            cancellation: CancellationHandler::new(
                store.clone(),
                ledger,
                settings.cancel_policy,
            ),
            query: QueryFacade::new(store),
        });
        (engine, handle)
    }

    /// Create a job and schedule it for execution.
    ///
    /// Fails with `InvalidSchedule` (and writes nothing) unless
    /// `scheduled_time` is strictly in the future. Submission to the
    /// scheduler is fire-and-forget.
    pub async fn create_job(
        &self,
        owner: OwnerId,
        name: impl Into<String>,
        description: impl Into<String>,
        scheduled_time: DateTime<Utc>,
    ) -> EngineResult<Job> {
        let job = Job::new(owner, name, description, scheduled_time)?;
        self.store.create(job.clone()).await?;
        self.scheduler.schedule(job.id, job.scheduled_time);
        info!(job_id = %job.id, owner = %owner, scheduled_time = %job.scheduled_time, "job created");
        Ok(job)
    }

    /// Cancel a job on behalf of its owner (see [`CancellationHandler`]).
    pub async fn cancel_job(&self, id: JobId, owner: OwnerId) -> EngineResult<()> {
        self.cancellation.cancel(id, owner).await
    }

    pub async fn get_job(&self, id: JobId, owner: OwnerId) -> EngineResult<Job> {
        self.query.get_job(id, owner).await
    }

    pub async fn get_result(&self, id: JobId, owner: OwnerId) -> EngineResult<JobResult> {
        self.query.get_result(id, owner).await
    }

    pub async fn list_jobs(&self, owner: OwnerId) -> EngineResult<Vec<Job>> {
        self.query.list_jobs(owner).await
    }

    pub async fn summarize_by_status(&self, owner: OwnerId) -> EngineResult<JobSummary> {
        self.query.summarize_by_status(owner).await
    }
}
