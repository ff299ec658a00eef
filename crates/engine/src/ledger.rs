//! Advisory fast-state ledger.
//!
//! Records the *currently believed* execution phase of a job so the
//! executor and a cancellation can short-circuit obviously-lost races
//! cheaply. Never authoritative: the store's conditional transition always
//! decides, and every ledger failure is logged and swallowed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use slated_core::JobId;
use thiserror::Error;
use tracing::warn;

/// Ledger unavailable or misbehaving. Only ever logged, never propagated.
#[derive(Debug, Error, Clone)]
#[error("ledger unavailable: {0}")]
pub struct LedgerError(pub String);

/// Low-latency, TTL-capable record of in-flight executions.
#[async_trait]
pub trait StateLedger: Send + Sync {
    /// Record that the job's body is (believed) running, expiring after
    /// `ttl`.
    async fn mark_running(&self, id: JobId, ttl: Duration) -> Result<(), LedgerError>;

    /// Whether the ledger currently believes the job is running.
    async fn is_running(&self, id: JobId) -> Result<bool, LedgerError>;

    /// Remove the entry for a job (idempotent).
    async fn clear(&self, id: JobId) -> Result<(), LedgerError>;
}

/// Log-and-continue wrapper for [`StateLedger::mark_running`].
pub(crate) async fn mark_running_best_effort(ledger: &dyn StateLedger, id: JobId, ttl: Duration) {
    if let Err(e) = ledger.mark_running(id, ttl).await {
        warn!(job_id = %id, error = %e, "state ledger mark failed; continuing without it");
    }
}

/// Log-and-continue wrapper for [`StateLedger::clear`].
pub(crate) async fn clear_best_effort(ledger: &dyn StateLedger, id: JobId) {
    if let Err(e) = ledger.clear(id).await {
        warn!(job_id = %id, error = %e, "state ledger clear failed; entry will expire by TTL");
    }
}

/// In-memory ledger for tests/dev. Entries expire lazily on read.
#[derive(Debug, Default)]
pub struct InMemoryStateLedger {
    entries: Mutex<HashMap<JobId, Instant>>,
}

impl InMemoryStateLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateLedger for InMemoryStateLedger {
    async fn mark_running(&self, id: JobId, ttl: Duration) -> Result<(), LedgerError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(id, Instant::now() + ttl);
        Ok(())
    }

    async fn is_running(&self, id: JobId) -> Result<bool, LedgerError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&id) {
            Some(expires) if *expires > Instant::now() => Ok(true),
            Some(_) => {
                entries.remove(&id);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self, id: JobId) -> Result<(), LedgerError> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&id);
        Ok(())
    }
}
