use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::model::{JobStatus, Segment, StatusUpdate};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRenderJobRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "userId is required"))]
    pub user_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "fileId is required"))]
    pub file_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "sourceUrl is required"))]
    pub source_url: String,
    /// Empty renders the whole file.
    #[serde(default)]
    #[validate(nested)]
    pub segments: Vec<Segment>,
}

/// Status report sent by a renderer that runs outside this process.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobStatusRequest {
    pub status: JobStatus,
    pub progress: Option<u8>,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

impl UpdateJobStatusRequest {
    pub fn into_parts(self) -> (JobStatus, StatusUpdate) {
        (
            self.status,
            StatusUpdate {
                progress: self.progress,
                result_url: self.result_url,
                error: self.error,
            },
        )
    }
}
