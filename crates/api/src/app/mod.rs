//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/ledger selection and engine wiring
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use slated_engine::SchedulerHandle;
use slated_infra::EngineConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router from the process environment (public
/// entrypoint used by `main.rs`). The returned handle owns the dispatcher
/// loop.
pub async fn build_app() -> (Router, SchedulerHandle) {
    let config = EngineConfig::from_env();
    let (services, handle) = services::build_services(config).await;
    (router_with(services), handle)
}

/// Assemble the router around already-built services (also used by tests).
pub fn router_with(services: Arc<services::AppServices>) -> Router {
    // Protected routes: require an authenticated, verified owner.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
