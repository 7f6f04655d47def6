use thiserror::Error;

use super::model::JobStatus;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid render request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Render job not found: {0}")]
    NotFound(String),

    #[error("Render job {id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },
}
