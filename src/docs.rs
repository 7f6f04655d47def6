use utoipa::OpenApi;
use crate::modules::render::dto::{CreateRenderJobRequest, UpdateJobStatusRequest};
use crate::modules::render::model::{JobStatus, QueueStats, RenderJob, Segment};
use crate::modules::upload::dto::UploadResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::render::handler::create_job,
        crate::modules::render::handler::get_job,
        crate::modules::render::handler::get_user_jobs,
        crate::modules::render::handler::update_job_status,
        crate::modules::render::handler::get_stats,
        crate::modules::upload::handler::upload_video,
    ),
    components(
        schemas(
            CreateRenderJobRequest, UpdateJobStatusRequest,
            RenderJob, Segment, JobStatus, QueueStats,
            UploadResponse,
        )
    ),
    tags(
        (name = "Render", description = "Render job queue"),
        (name = "Uploads", description = "Source footage uploads")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/jobs",
            "/api/v1/jobs/{id}",
            "/api/v1/jobs/{id}/status",
            "/api/v1/jobs/stats",
            "/api/v1/users/{user_id}/jobs",
            "/api/v1/uploads",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
