use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use slated_engine::EngineError;

/// Map engine errors to HTTP responses.
///
/// Contention (`already_finished`, `race_lost`, `not_cancellable`) and
/// `not_ready` are declined operations, not server failures, and get
/// distinct codes so clients can tell them apart from `not_found`.
pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        EngineError::InvalidSchedule => {
            json_error(StatusCode::BAD_REQUEST, "invalid_schedule", err.to_string())
        }
        EngineError::AlreadyTerminal(_, _) => {
            json_error(StatusCode::CONFLICT, "already_finished", err.to_string())
        }
        EngineError::RaceLost(_) => json_error(StatusCode::CONFLICT, "race_lost", err.to_string()),
        EngineError::NotCancellable(_, _) => {
            json_error(StatusCode::CONFLICT, "not_cancellable", err.to_string())
        }
        EngineError::NotReady(_) => json_error(StatusCode::CONFLICT, "not_ready", err.to_string()),
        EngineError::Execution(_) | EngineError::RetriesExhausted { .. } => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "execution_error",
            err.to_string(),
        ),
        EngineError::Storage(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            err.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
