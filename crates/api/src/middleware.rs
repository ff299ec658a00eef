//! Request middleware: lift the boundary-authenticated identity into an
//! [`OwnerContext`] extension.
//!
//! Authentication itself (login, sessions, email verification flows) is an
//! external collaborator; by the time a request reaches this service the
//! gateway has already verified the caller and stamped these headers.

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::context::OwnerContext;

const USER_ID_HEADER: &str = "x-user-id";
const VERIFIED_HEADER: &str = "x-email-verified";

pub async fn auth_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let owner = extract_owner(req.headers())?;
    ensure_verified(req.headers())?;

    req.extensions_mut().insert(OwnerContext::new(owner));

    Ok(next.run(req).await)
}

fn extract_owner(headers: &HeaderMap) -> Result<slated_core::OwnerId, StatusCode> {
    let header = headers
        .get(USER_ID_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;
    header.parse().map_err(|_| StatusCode::UNAUTHORIZED)
}

/// Submitting/viewing jobs requires a verified principal (the engine treats
/// this as a pre-condition, not something it checks itself).
fn ensure_verified(headers: &HeaderMap) -> Result<(), StatusCode> {
    let verified = headers
        .get(VERIFIED_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if verified {
        Ok(())
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}
