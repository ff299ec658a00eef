//! Infrastructure wiring: pick the store/ledger adapters and spawn the
//! engine.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use slated_engine::{
    InMemoryJobStore, InMemoryStateLedger, JobEngine, JobStore, SchedulerHandle,
    SimulatedJobBody, StateLedger,
};
use slated_infra::{EngineConfig, PostgresJobStore};

/// Services shared by all request handlers.
pub struct AppServices {
    pub engine: Arc<JobEngine>,
}

/// Wire the engine onto the configured adapters.
///
/// Falls back to in-memory adapters when no URLs are configured, so the
/// service runs out of the box in dev.
pub async fn build_services(config: EngineConfig) -> (Arc<AppServices>, SchedulerHandle) {
    let store = build_store(&config).await;
    let ledger = build_ledger(&config).await;

    let (engine, handle) = JobEngine::spawn(
        store,
        ledger,
        Arc::new(SimulatedJobBody::default()),
        config.settings.clone(),
    );

    (Arc::new(AppServices { engine }), handle)
}

async fn build_store(config: &EngineConfig) -> Arc<dyn JobStore> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .expect("failed to connect to Postgres");
            let store = PostgresJobStore::new(pool);
            store
                .ensure_schema()
                .await
                .expect("failed to ensure job schema");
            info!("using Postgres job store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory job store");
            Arc::new(InMemoryJobStore::new())
        }
    }
}

async fn build_ledger(config: &EngineConfig) -> Arc<dyn StateLedger> {
    #[cfg(feature = "redis")]
    if let Some(url) = &config.redis_url {
        match slated_infra::RedisStateLedger::connect(url).await {
            Ok(ledger) => {
                info!("using Redis state ledger");
                return Arc::new(ledger);
            }
            // Advisory only: degrade rather than fail startup.
            Err(e) => warn!(error = %e, "redis unavailable; using in-memory ledger"),
        }
    }

    #[cfg(not(feature = "redis"))]
    if config.redis_url.is_some() {
        warn!("REDIS_URL set but the redis feature is disabled; using in-memory ledger");
    }

    Arc::new(InMemoryStateLedger::new())
}
