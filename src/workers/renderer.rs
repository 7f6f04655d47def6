use async_trait::async_trait;

use crate::modules::render::model::RenderJob;
use crate::modules::render::service::RenderQueue;

/// Turns a job's source into an output artifact.
///
/// The driver awaits `render` for exactly one job at a time. Implementations
/// report through `queue`: any number of `processing` progress updates,
/// then one `completed` (with `result_url`) or `error`. Once a terminal
/// status has been reported no further updates may be sent.
///
/// Returning `Err` without reporting is tolerated. The driver records the
/// error on the job if it has not reached a terminal state.
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    async fn render(&self, job: RenderJob, queue: RenderQueue) -> anyhow::Result<()>;
}
