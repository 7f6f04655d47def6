use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use crate::state::AppState;
use tower_http::limit::RequestBodyLimitLayer;

pub mod dto;
pub mod handler;

// VHS captures run long; cap a single upload at 4 GiB.
const MAX_UPLOAD_BYTES: usize = 4 * 1024 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/uploads", post(handler::upload_video))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
}
