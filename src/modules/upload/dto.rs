use serde::Serialize;
use utoipa::ToSchema;

/// Stored source footage, ready to be referenced by a render job.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_id: String,
    pub key: String,
    pub source_url: String,
    pub content_type: String,
    pub size: u64,
}
