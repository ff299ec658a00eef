//! Redis-backed fast state ledger (optional).
//!
//! Stores `job:<id> -> "in-progress"` with a short TTL. Purely an advisory
//! accelerator for race detection: callers log and continue on every error
//! here, and correctness always falls back to the job store's conditional
//! transition.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use slated_core::JobId;
use slated_engine::{LedgerError, StateLedger};

const PHASE_IN_PROGRESS: &str = "in-progress";

/// Redis ledger over a multiplexed async connection.
#[derive(Clone)]
pub struct RedisStateLedger {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisStateLedger {
    /// Connect to Redis at `url`.
    pub async fn connect(url: impl AsRef<str>) -> Result<Self, LedgerError> {
        let client =
            redis::Client::open(url.as_ref()).map_err(|e| LedgerError(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| LedgerError(e.to_string()))?;
        Ok(Self { conn })
    }

    fn key(id: JobId) -> String {
        format!("job:{id}")
    }
}

#[async_trait]
impl StateLedger for RedisStateLedger {
    async fn mark_running(&self, id: JobId, ttl: Duration) -> Result<(), LedgerError> {
        let mut conn = self.conn.clone();
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(Self::key(id), PHASE_IN_PROGRESS, ttl_secs)
            .await
            .map_err(|e| LedgerError(e.to_string()))
    }

    async fn is_running(&self, id: JobId) -> Result<bool, LedgerError> {
        let mut conn = self.conn.clone();
        let phase: Option<String> = conn
            .get(Self::key(id))
            .await
            .map_err(|e| LedgerError(e.to_string()))?;
        Ok(phase.as_deref() == Some(PHASE_IN_PROGRESS))
    }

    async fn clear(&self, id: JobId) -> Result<(), LedgerError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::key(id))
            .await
            .map_err(|e| LedgerError(e.to_string()))
    }
}
