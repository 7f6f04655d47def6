use super::dto::{CreateRenderJobRequest, UpdateJobStatusRequest};
use super::error::QueueError;
use super::model::{QueueStats, RenderJob};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// Queue a render job
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    request_body = CreateRenderJobRequest,
    responses(
        (status = 201, description = "Render job queued", body = ApiResponse<RenderJob>),
        (status = 400, description = "Missing or invalid fields")
    ),
    tag = "Render"
)]
pub async fn create_job(
    State(state): State<AppState>,
    Json(payload): Json<CreateRenderJobRequest>,
) -> impl IntoResponse {
    match state.jobs.create_job(payload).await {
        Ok(job) => ApiSuccess(
            ApiResponse::success(job, "Render job queued"),
            StatusCode::CREATED,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Get a render job
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(
        ("id" = String, Path, description = "Render job ID")
    ),
    responses(
        (status = 200, description = "Render job", body = ApiResponse<RenderJob>),
        (status = 404, description = "Render job not found")
    ),
    tag = "Render"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.jobs.get_job(&id).await {
        Some(job) => ApiSuccess(
            ApiResponse::success(job, "Render job retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        None => ApiError::from(QueueError::NotFound(id)).into_response(),
    }
}

/// List a user's render jobs
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/jobs",
    params(
        ("user_id" = String, Path, description = "Owner of the jobs")
    ),
    responses(
        (status = 200, description = "Render jobs of the user", body = ApiResponse<Vec<RenderJob>>)
    ),
    tag = "Render"
)]
pub async fn get_user_jobs(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let jobs = state.jobs.get_user_jobs(&user_id).await;
    ApiSuccess(
        ApiResponse::success(jobs, "Render jobs retrieved successfully"),
        StatusCode::OK,
    )
    .into_response()
}

/// Report render progress or outcome
#[utoipa::path(
    put,
    path = "/api/v1/jobs/{id}/status",
    params(
        ("id" = String, Path, description = "Render job ID")
    ),
    request_body = UpdateJobStatusRequest,
    responses(
        (status = 200, description = "Status applied", body = ApiResponse<RenderJob>),
        (status = 404, description = "Render job not found"),
        (status = 409, description = "Transition rejected in strict mode")
    ),
    tag = "Render"
)]
pub async fn update_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateJobStatusRequest>,
) -> impl IntoResponse {
    let (status, update) = payload.into_parts();

    match state.jobs.update_status(&id, status, update).await {
        Ok(Some(job)) => ApiSuccess(
            ApiResponse::success(job, "Render job status updated"),
            StatusCode::OK,
        )
        .into_response(),
        Ok(None) => ApiError::from(QueueError::NotFound(id)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Queue statistics
#[utoipa::path(
    get,
    path = "/api/v1/jobs/stats",
    responses(
        (status = 200, description = "Point-in-time queue statistics", body = ApiResponse<QueueStats>)
    ),
    tag = "Render"
)]
pub async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.jobs.get_stats().await;
    ApiSuccess(
        ApiResponse::success(stats, "Queue statistics retrieved successfully"),
        StatusCode::OK,
    )
    .into_response()
}
