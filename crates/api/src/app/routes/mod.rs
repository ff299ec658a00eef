use axum::Router;

pub mod jobs;
pub mod system;

/// Router for all authenticated (owner-scoped) endpoints.
pub fn router() -> Router {
    Router::new().nest("/jobs", jobs::router())
}
