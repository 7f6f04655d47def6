use axum::routing::{get, post, put};
use axum::Router;
use crate::state::AppState;

pub mod dto;
pub mod error;
pub mod handler;
pub mod model;
pub mod queue;
pub mod service;
pub mod store;
pub mod sweeper;
#[cfg(test)]
pub mod testing;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(handler::create_job))
        .route("/jobs/stats", get(handler::get_stats))
        .route("/jobs/{id}", get(handler::get_job))
        .route("/jobs/{id}/status", put(handler::update_job_status))
        .route("/users/{user_id}/jobs", get(handler::get_user_jobs))
}
