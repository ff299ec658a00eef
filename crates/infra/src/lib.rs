//! Infrastructure layer: Postgres job store, Redis state ledger, config.

pub mod config;
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis_ledger;

pub use config::EngineConfig;
pub use postgres::PostgresJobStore;

#[cfg(feature = "redis")]
pub use redis_ledger::RedisStateLedger;
