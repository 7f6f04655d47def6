use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Lifecycle of a render job: `queued -> processing -> completed | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Transitions accepted in strict mode. Repeated `processing` updates are
    /// how renderers report progress.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Queued => matches!(next, JobStatus::Processing | JobStatus::Error),
            JobStatus::Processing => matches!(
                next,
                JobStatus::Processing | JobStatus::Completed | JobStatus::Error
            ),
            JobStatus::Completed | JobStatus::Error => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `[start, end)` range of the source, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "validate_segment"))]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

fn validate_segment(segment: &Segment) -> Result<(), ValidationError> {
    if !segment.start.is_finite() || segment.start < 0.0 {
        return Err(ValidationError::new("segment_start")
            .with_message("segment start must be a non-negative number of seconds".into()));
    }
    if !segment.end.is_finite() || segment.end <= segment.start {
        return Err(ValidationError::new("segment_end")
            .with_message("segment end must be greater than its start".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderJob {
    pub id: String,
    pub user_id: String,
    pub file_id: String,
    pub source_url: String,
    pub segments: Vec<Segment>,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// Optional fields carried by a status update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub progress: Option<u8>,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn completed(result_url: impl Into<String>) -> Self {
        Self {
            progress: Some(100),
            result_url: Some(result_url.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl RenderJob {
    /// Applies a status change and stamps `started_at`/`completed_at` the first
    /// time the job reaches `processing` or a terminal state.
    pub fn apply(&mut self, status: JobStatus, update: StatusUpdate, now: OffsetDateTime) {
        self.status = status;

        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(result_url) = update.result_url {
            self.result_url = Some(result_url);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }

        if status == JobStatus::Processing && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }

    /// The driver's `queued -> processing` step. Progress starts over at zero.
    pub fn begin_processing(&mut self, now: OffsetDateTime) {
        self.apply(JobStatus::Processing, StatusUpdate::progress(0), now);
    }

    /// Records a failure unless the job already finished one way or another.
    pub fn fail(&mut self, error: impl Into<String>, now: OffsetDateTime) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.apply(JobStatus::Error, StatusUpdate::failed(error), now);
        true
    }

    /// Total requested duration in seconds, if the job is restricted to segments.
    pub fn segments_duration(&self) -> Option<f64> {
        if self.segments.is_empty() {
            None
        } else {
            Some(self.segments.iter().map(Segment::duration).sum())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
    pub queue_length: usize,
    pub is_processing: bool,
}
