//! Renderers and helpers for driving the queue in tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::dto::CreateRenderJobRequest;
use super::model::{JobStatus, RenderJob};
use super::service::{QueueOptions, RenderQueue};
use crate::workers::renderer::Renderer;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub fn fast_options() -> QueueOptions {
    QueueOptions {
        drain_delay: Duration::from_millis(5),
        ..QueueOptions::default()
    }
}

pub fn request(user_id: &str) -> CreateRenderJobRequest {
    CreateRenderJobRequest {
        user_id: user_id.to_string(),
        file_id: "file-1".to_string(),
        source_url: "https://cdn.example.com/uploads/tape.mp4".to_string(),
        segments: vec![],
    }
}

/// A render that has been handed to the renderer and is waiting to be
/// released by the test. Dropping it leaves the render hanging.
pub struct StartedRender {
    pub job: RenderJob,
    release: oneshot::Sender<anyhow::Result<()>>,
}

impl StartedRender {
    pub fn finish(self) {
        let _ = self.release.send(Ok(()));
    }
}

/// Announces each render on a channel and blocks until the test releases it.
pub struct ScriptedRenderer {
    started: mpsc::UnboundedSender<StartedRender>,
}

pub fn scripted() -> (Arc<ScriptedRenderer>, mpsc::UnboundedReceiver<StartedRender>) {
    let (started, rx) = mpsc::unbounded_channel();
    (Arc::new(ScriptedRenderer { started }), rx)
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(&self, job: RenderJob, _queue: RenderQueue) -> anyhow::Result<()> {
        let (release, released) = oneshot::channel();
        if self.started.send(StartedRender { job, release }).is_err() {
            return Ok(());
        }
        match released.await {
            Ok(result) => result,
            Err(_) => std::future::pending().await,
        }
    }
}

pub struct FailingRenderer;

#[async_trait]
impl Renderer for FailingRenderer {
    async fn render(&self, _job: RenderJob, _queue: RenderQueue) -> anyhow::Result<()> {
        Err(anyhow!("ffmpeg exited with status 1"))
    }
}

pub struct PanickingRenderer;

#[async_trait]
impl Renderer for PanickingRenderer {
    async fn render(&self, job: RenderJob, _queue: RenderQueue) -> anyhow::Result<()> {
        panic!("renderer blew up on {}", job.id);
    }
}

pub struct NeverRenderer;

#[async_trait]
impl Renderer for NeverRenderer {
    async fn render(&self, _job: RenderJob, _queue: RenderQueue) -> anyhow::Result<()> {
        std::future::pending().await
    }
}

pub async fn next_start(starts: &mut mpsc::UnboundedReceiver<StartedRender>) -> StartedRender {
    tokio::time::timeout(WAIT_LIMIT, starts.recv())
        .await
        .expect("no render started in time")
        .expect("renderer dropped")
}

pub async fn wait_for_status(queue: &RenderQueue, id: &str, status: JobStatus) -> RenderJob {
    tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            if let Some(job) = queue.get_job(id).await {
                if job.status == status {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("job never reached the expected status")
}

pub async fn wait_until_idle(queue: &RenderQueue) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while queue.get_stats().await.is_processing {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("driver never went idle")
}
