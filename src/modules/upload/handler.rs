use super::dto::UploadResponse;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::{stream_to_storage, video_content_type};
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

/// Upload source footage
/// Streams the `video` field of a multipart form to object storage
#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Footage stored", body = ApiResponse<UploadResponse>),
        (status = 400, description = "Missing or empty video field, or unsupported content type"),
        (status = 500, description = "Storage failure")
    ),
    tag = "Uploads"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return ApiError(format!("Malformed multipart body: {}", e), StatusCode::BAD_REQUEST).into_response(),
        };

        if field.name() != Some("video") {
            continue;
        }

        let file_name = sanitize_file_name(field.file_name().unwrap_or("footage.mp4"));
        let content_type = match video_content_type(field.content_type(), &file_name) {
            Ok(mime) => mime,
            Err(e) => return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response(),
        };

        let file_id = Uuid::new_v4().to_string();
        let key = format!("uploads/{}/{}", file_id, file_name);
        info!(file_id = %file_id, file_name = %file_name, "Starting footage upload");

        return match stream_to_storage(&state.storage, field, key.clone(), &content_type).await {
            Ok((source_url, size)) => ApiSuccess(
                ApiResponse::success(
                    UploadResponse {
                        file_id,
                        key,
                        source_url,
                        content_type: content_type.to_string(),
                        size,
                    },
                    "Footage uploaded successfully",
                ),
                StatusCode::CREATED,
            )
            .into_response(),
            Err(e) if e.is_client_error() => ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response(),
            Err(e) => ApiError(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
        };
    }

    ApiError("No video field found in multipart request".to_string(), StatusCode::BAD_REQUEST).into_response()
}

/// Keeps object keys to a single, printable path segment.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "footage.mp4".to_string()
    } else {
        cleaned
    }
}
