//! Environment-driven engine configuration.
//!
//! Every knob has a dev-friendly default; malformed values fall back with
//! a warning rather than aborting startup.

use std::time::Duration;

use tracing::warn;

use slated_engine::{CancelPolicy, EngineSettings, RetryPolicy};

/// Deployment configuration for the engine and its adapters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Postgres connection string (`DATABASE_URL`)
    pub database_url: Option<String>,
    /// Redis connection string (`REDIS_URL`)
    pub redis_url: Option<String>,
    pub settings: EngineSettings,
}

impl EngineConfig {
    /// Load the configuration from the process environment.
    ///
    /// - `DATABASE_URL`, `REDIS_URL`: adapters (in-memory fallback if unset)
    /// - `SLATED_GRACE_MS`: dispatch slack, default 1000
    /// - `SLATED_MAX_RETRIES`: default 3
    /// - `SLATED_RETRY_DELAY_SECS`: fixed delay between attempts, default 60
    /// - `SLATED_LEDGER_TTL_SECS`: advisory entry TTL, default 600
    /// - `SLATED_CANCEL_IN_PROGRESS`: `true` enables cancelling running jobs
    pub fn from_env() -> Self {
        let defaults = EngineSettings::default();
        let settings = EngineSettings {
            grace: Duration::from_millis(env_parse("SLATED_GRACE_MS", 1000)),
            retry: RetryPolicy::fixed(
                env_parse("SLATED_MAX_RETRIES", 3u32),
                Duration::from_secs(env_parse("SLATED_RETRY_DELAY_SECS", 60)),
            ),
            ledger_ttl: Duration::from_secs(env_parse("SLATED_LEDGER_TTL_SECS", 600)),
            cancel_policy: if env_parse("SLATED_CANCEL_IN_PROGRESS", false) {
                CancelPolicy::AllowInProgress
            } else {
                defaults.cancel_policy
            },
        };

        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            settings,
        }
    }
}

/// Parse an env var, falling back (with a warning) on absence or junk.
fn env_parse<T: std::str::FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, %default, "unparsable value; using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_engine_defaults() {
        // Absent vars are the common case in tests; spot-check the fallbacks.
        let value: u64 = env_parse("SLATED_TEST_UNSET_VAR", 1000);
        assert_eq!(value, 1000);
    }
}
