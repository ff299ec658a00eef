//! Delayed-dispatch scheduler.
//!
//! One dispatcher loop services a min-heap of pending wake-ups: it sleeps
//! until the earliest due instant, then spawns the executor for every due
//! job. Worker capacity is never consumed by pure waiting, and submission
//! is fire-and-forget relative to the caller.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use slated_core::JobId;

use crate::executor::Executor;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed delay added to every wake-up. Intentional slack against
    /// clock-skew edge cases; jobs run at-or-after their scheduled instant.
    pub grace: Duration,
    /// Name for logging
    pub name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(1),
            name: "job-scheduler".to_string(),
        }
    }
}

enum SchedulerMsg {
    Dispatch { id: JobId, due: DateTime<Utc> },
    Shutdown,
}

/// Cheap handle for submitting wake-ups to the dispatcher loop.
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<SchedulerMsg>,
}

impl Scheduler {
    /// Spawn the dispatcher loop.
    pub fn spawn(executor: Arc<Executor>, config: SchedulerConfig) -> (Scheduler, SchedulerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let name = config.name.clone();
        let join = tokio::spawn(dispatcher_loop(executor, config, rx));
        info!(scheduler = %name, "scheduler started");
        (
            Scheduler { tx: tx.clone() },
            SchedulerHandle { tx, join },
        )
    }

    /// Arrange for the executor to be invoked at-or-after `due`.
    ///
    /// Fire-and-forget: never blocks, never fails the caller. A submission
    /// after shutdown is dropped with an error log.
    pub fn schedule(&self, id: JobId, due: DateTime<Utc>) {
        if self
            .tx
            .send(SchedulerMsg::Dispatch { id, due })
            .is_err()
        {
            error!(job_id = %id, "scheduler is shut down; dropping dispatch request");
        }
    }
}

/// Handle to shut the dispatcher loop down gracefully.
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<SchedulerMsg>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request shutdown and wait for the loop to exit. Pending wake-ups
    /// are dropped; durable jobs remain `pending` in the store.
    pub async fn shutdown(self) {
        let _ = self.tx.send(SchedulerMsg::Shutdown);
        let _ = self.join.await;
    }
}

async fn dispatcher_loop(
    executor: Arc<Executor>,
    config: SchedulerConfig,
    mut rx: mpsc::UnboundedReceiver<SchedulerMsg>,
) {
    // Min-heap of (wake-up instant, job id).
    let mut wakeups: BinaryHeap<Reverse<(Instant, JobId)>> = BinaryHeap::new();

    loop {
        let next_due = wakeups.peek().map(|Reverse((at, _))| *at);
        let sleep = async {
            match next_due {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            msg = rx.recv() => match msg {
                Some(SchedulerMsg::Dispatch { id, due }) => {
                    let wake_at = wake_instant(due, config.grace);
                    debug!(scheduler = %config.name, job_id = %id, due = %due, "wake-up queued");
                    wakeups.push(Reverse((wake_at, id)));
                }
                Some(SchedulerMsg::Shutdown) | None => break,
            },
            _ = sleep => {
                let now = Instant::now();
                while let Some(Reverse((at, id))) = wakeups.peek().copied() {
                    if at > now {
                        break;
                    }
                    wakeups.pop();
                    dispatch(executor.clone(), id);
                }
            }
        }
    }

    info!(scheduler = %config.name, "scheduler stopped");
}

/// Translate a wall-clock due time into a monotonic wake-up instant.
fn wake_instant(due: DateTime<Utc>, grace: Duration) -> Instant {
    let remaining = (due - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Instant::now() + remaining + grace
}

fn dispatch(executor: Arc<Executor>, id: JobId) {
    tokio::spawn(async move {
        match executor.execute(id).await {
            Ok(()) => {}
            // Expected outcome of a cancellation race or a deleted job.
            Err(e) if e.is_contention() => {
                debug!(job_id = %id, error = %e, "dispatch became a no-op")
            }
            Err(e) => error!(job_id = %id, error = %e, "job execution failed"),
        }
    });
}
