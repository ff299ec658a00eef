use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use slated_core::JobId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_job).get(list_jobs))
        .route("/summary", get(summarize_jobs))
        .route("/:id", get(get_job))
        .route("/:id/result", get(get_result))
        .route("/:id/cancel", post(cancel_job))
}

pub async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Json(body): Json<dto::CreateJobRequest>,
) -> axum::response::Response {
    if body.name.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_name", "name must not be empty");
    }

    match services
        .engine
        .create_job(owner.owner(), body.name, body.description, body.scheduled_time)
        .await
    {
        Ok(job) => (
            StatusCode::CREATED,
            Json(dto::JobResponse::from_job(job, None)),
        )
            .into_response(),
        Err(err) => errors::engine_error_to_response(err),
    }
}

pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
) -> axum::response::Response {
    match services.engine.list_jobs(owner.owner()).await {
        Ok(jobs) => {
            let items = jobs
                .into_iter()
                .map(|job| dto::JobResponse::from_job(job, None))
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(err) => errors::engine_error_to_response(err),
    }
}

pub async fn summarize_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
) -> axum::response::Response {
    match services.engine.summarize_by_status(owner.owner()).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => errors::engine_error_to_response(err),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&id) {
        Ok(job_id) => job_id,
        Err(resp) => return resp,
    };

    let job = match services.engine.get_job(job_id, owner.owner()).await {
        Ok(job) => job,
        Err(err) => return errors::engine_error_to_response(err),
    };

    // A terminal job carries its result inline; skip the lookup otherwise.
    let result = if job.status.is_terminal() {
        match services.engine.get_result(job_id, owner.owner()).await {
            Ok(result) => Some(result),
            Err(err) => return errors::engine_error_to_response(err),
        }
    } else {
        None
    };

    (StatusCode::OK, Json(dto::JobResponse::from_job(job, result))).into_response()
}

pub async fn get_result(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&id) {
        Ok(job_id) => job_id,
        Err(resp) => return resp,
    };

    match services.engine.get_result(job_id, owner.owner()).await {
        Ok(result) => (
            StatusCode::OK,
            Json(dto::JobResultResponse::from(result)),
        )
            .into_response(),
        Err(err) => errors::engine_error_to_response(err),
    }
}

pub async fn cancel_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&id) {
        Ok(job_id) => job_id,
        Err(resp) => return resp,
    };

    match services.engine.cancel_job(job_id, owner.owner()).await {
        Ok(()) => match services.engine.get_job(job_id, owner.owner()).await {
            Ok(job) => (StatusCode::OK, Json(dto::JobResponse::from_job(job, None))).into_response(),
            Err(err) => errors::engine_error_to_response(err),
        },
        Err(err) => errors::engine_error_to_response(err),
    }
}

fn parse_job_id(raw: &str) -> Result<JobId, axum::response::Response> {
    raw.parse::<JobId>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("'{raw}' is not a valid job id"),
        )
    })
}
