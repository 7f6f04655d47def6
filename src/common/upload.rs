use crate::infrastructure::storage::s3::StorageService;
use anyhow::{anyhow, Result};
use axum::{body::Bytes, extract::multipart::Field};
use futures_util::StreamExt;
use mime::Mime;
use thiserror::Error;
use tracing::{error, info, warn};

// S3 rejects non-final parts under 5 MiB.
const MIN_PART_SIZE: usize = 6 * 1024 * 1024;

pub struct MultipartUploader<'a> {
    storage: &'a StorageService,
    key: String,
    upload_id: String,
    parts: Vec<aws_sdk_s3::types::CompletedPart>,
    part_number: i32,
    buffer: Vec<u8>,
    bytes_sent: u64,
}

impl<'a> MultipartUploader<'a> {
    pub async fn new(storage: &'a StorageService, key: String, content_type: &str) -> Result<Self> {
        let upload_id = storage
            .create_multipart_upload(&key, content_type)
            .await
            .map_err(|e| anyhow!("Failed to initiate upload: {}", e))?;

        Ok(Self {
            storage,
            key,
            upload_id,
            parts: Vec::new(),
            part_number: 1,
            buffer: Vec::with_capacity(MIN_PART_SIZE),
            bytes_sent: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.buffer.extend_from_slice(&chunk);

        if self.buffer.len() >= MIN_PART_SIZE {
            self.flush_part().await?;
        }

        Ok(())
    }

    async fn flush_part(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let part = std::mem::replace(&mut self.buffer, Vec::with_capacity(MIN_PART_SIZE));
        let len = part.len() as u64;

        let completed = self
            .storage
            .upload_part(&self.key, &self.upload_id, self.part_number, Bytes::from(part))
            .await
            .map_err(|e| anyhow!("Failed to upload part {}: {}", self.part_number, e))?;

        self.parts.push(completed);
        self.part_number += 1;
        self.bytes_sent += len;

        Ok(())
    }

    /// Flushes the last part and completes the upload. On error the upload is
    /// still open and must be aborted.
    pub async fn finish(&mut self) -> Result<(String, u64)> {
        self.flush_part().await?;

        if self.bytes_sent == 0 {
            return Err(anyhow!("Refusing to complete an empty upload"));
        }

        let parts = std::mem::take(&mut self.parts);
        let url = self
            .storage
            .complete_multipart_upload(&self.key, &self.upload_id, parts)
            .await
            .map_err(|e| anyhow!("Failed to complete upload: {}", e))?;

        Ok((url, self.bytes_sent))
    }

    pub async fn abort(&self) -> Result<()> {
        self.storage
            .abort_multipart_upload(&self.key, &self.upload_id)
            .await
            .map_err(|e| anyhow!("Failed to abort upload: {}", e))
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Uploaded video is empty")]
    Empty,

    #[error("Upload stream interrupted: {0}")]
    Interrupted(String),

    #[error("Upload failed: {0}")]
    Storage(anyhow::Error),
}

impl UploadError {
    /// Whether the client, rather than storage, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, UploadError::Empty | UploadError::Interrupted(_))
    }
}

/// Content type of an uploaded video. Falls back to the file extension when the
/// client sent none, and rejects anything that is not `video/*`.
pub fn video_content_type(declared: Option<&str>, file_name: &str) -> Result<Mime> {
    let mime = match declared {
        Some(declared) if declared != "application/octet-stream" => declared
            .parse::<Mime>()
            .map_err(|_| anyhow!("Invalid content type: {}", declared))?,
        _ => mime_guess::from_path(file_name).first_or_octet_stream(),
    };

    if mime.type_() != mime::VIDEO {
        return Err(anyhow!("Invalid content type {}: only video/* allowed", mime));
    }

    Ok(mime)
}

/// Streams a multipart field to storage under `key`. Returns the object URL and
/// the number of bytes written. Nothing is sent to storage for an empty field,
/// and a started upload is aborted on any failure.
pub async fn stream_to_storage(
    storage: &StorageService,
    mut field: Field<'_>,
    key: String,
    content_type: &Mime,
) -> Result<(String, u64), UploadError> {
    let Some(first) = next_chunk(&mut field).await? else {
        return Err(UploadError::Empty);
    };

    let mut uploader = MultipartUploader::new(storage, key.clone(), content_type.as_ref())
        .await
        .map_err(UploadError::Storage)?;

    match pump(&mut uploader, &mut field, first).await {
        Ok((url, size)) => {
            info!(key = %key, size, "Upload stored");
            Ok((url, size))
        }
        Err(e) => {
            error!(key = %key, "Upload error: {}", e);
            if let Err(abort_err) = uploader.abort().await {
                warn!(key = %key, "Could not abort upload: {:#}", abort_err);
            }
            Err(e)
        }
    }
}

async fn pump(
    uploader: &mut MultipartUploader<'_>,
    field: &mut Field<'_>,
    first: Bytes,
) -> Result<(String, u64), UploadError> {
    uploader.write_chunk(first).await.map_err(UploadError::Storage)?;

    while let Some(chunk) = next_chunk(field).await? {
        uploader.write_chunk(chunk).await.map_err(UploadError::Storage)?;
    }

    uploader.finish().await.map_err(UploadError::Storage)
}

/// Next non-empty chunk of `field`, or `None` at the end of the stream.
async fn next_chunk(field: &mut Field<'_>) -> Result<Option<Bytes>, UploadError> {
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| UploadError::Interrupted(e.to_string()))?;
        if !chunk.is_empty() {
            return Ok(Some(chunk));
        }
    }
    Ok(None)
}
