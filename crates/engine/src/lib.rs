//! `slated-engine` — scheduled job lifecycle engine.
//!
//! ## Design
//!
//! - Jobs are owner-scoped, created `pending` with a future `scheduled_time`
//! - A single dispatcher loop wakes at-or-after the scheduled instant and
//!   hands the job to the executor (submission never blocks the caller)
//! - `compare_and_set_status` on the [`JobStore`] is the **only** state
//!   transition primitive; it is how the executor and a user cancellation
//!   race deterministically
//! - The [`StateLedger`] is an advisory accelerator for race detection,
//!   never authoritative
//! - Transient body failures retry with a bounded policy while the job
//!   stays `in-progress`; exactly one terminal `JobResult` is persisted
//!
//! ## Components
//!
//! - `Job` / `JobStatus` / `JobResult`: the tracked state (see `types`)
//! - `JobStore`: persistence seam (in-memory here; Postgres in infra)
//! - `Scheduler`: delayed-dispatch loop over a min-heap of wake-ups
//! - `Executor`: runs the opaque job body, finalizes via conditional
//!   transitions
//! - `CancellationHandler`: user-initiated cancel, racing the executor
//! - `QueryFacade`: owner-scoped reads and the per-status summary

pub mod cancel;
pub mod engine;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod query;
pub mod scheduler;
pub mod store;
pub mod types;


pub use cancel::{CancelPolicy, CancellationHandler, CANCELLED_BY_USER};
pub use engine::{EngineSettings, JobEngine};
pub use error::{EngineError, EngineResult};
pub use executor::{BodyError, Executor, JobBody, SimulatedJobBody};
pub use ledger::{InMemoryStateLedger, LedgerError, StateLedger};
pub use query::QueryFacade;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
pub use store::{InMemoryJobStore, JobStore, JobSummary};
pub use types::{Job, JobResult, JobStatus, RetryPolicy};
