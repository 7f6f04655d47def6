use std::path::Path;

use anyhow::{anyhow, Context, Result};
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::{config::BehaviorVersion, config::Credentials, config::Region, Client};
use tracing::{debug, info};
use url::Url;

/// Bucket access for uploaded footage and rendered outputs.
#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
    endpoint: Url,
}

impl StorageService {
    pub fn new(endpoint: &str, bucket: &str, access_key: &str, secret_key: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid storage endpoint: {}", endpoint))?;
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint.as_str())
            .credentials_provider(credentials)
            .force_path_style(true) // MinIO serves buckets by path
            .build();

        let client = Client::from_conf(config);

        info!(endpoint = %endpoint, bucket, "Storage client configured");

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            endpoint,
        })
    }

    /// Path-style public URL of `key`.
    pub fn object_url(&self, key: &str) -> Result<String> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Storage endpoint cannot carry a path: {}", self.endpoint))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(key.split('/'));
        Ok(url.to_string())
    }

    pub async fn create_multipart_upload(&self, key: &str, content_type: &str) -> Result<String> {
        let result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        result
            .upload_id
            .ok_or_else(|| anyhow!("Storage returned no upload id for {}", key))
    }

    pub async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: bytes::Bytes,
    ) -> Result<CompletedPart> {
        let result = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        let e_tag = result
            .e_tag
            .ok_or_else(|| anyhow!("Storage returned no ETag for part {} of {}", part_number, key))?;

        Ok(CompletedPart::builder()
            .e_tag(e_tag)
            .part_number(part_number)
            .build())
    }

    pub async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<String> {
        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        self.object_url(key)
    }

    pub async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        Ok(())
    }

    /// Uploads a local file in one request and returns its URL.
    pub async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<String> {
        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        debug!(key, "Uploaded {}", path.display());
        self.object_url(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(endpoint: &str) -> StorageService {
        StorageService::new(endpoint, "videos", "minio", "minio123").unwrap()
    }

    #[test]
    fn object_url_is_path_style() {
        let storage = storage("http://localhost:9000");
        assert_eq!(
            storage.object_url("renders/job_1.mp4").unwrap(),
            "http://localhost:9000/videos/renders/job_1.mp4"
        );
    }

    #[test]
    fn object_url_keeps_endpoint_prefix_and_escapes_keys() {
        let storage = storage("https://files.example.com/s3/");
        assert_eq!(
            storage.object_url("uploads/abc/my tape.mp4").unwrap(),
            "https://files.example.com/s3/videos/uploads/abc/my%20tape.mp4"
        );
    }

    #[test]
    fn rejects_invalid_endpoints() {
        assert!(StorageService::new("not a url", "videos", "a", "b").is_err());
    }
}
