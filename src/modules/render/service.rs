use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use validator::Validate;

use super::dto::CreateRenderJobRequest;
use super::error::QueueError;
use super::model::{JobStatus, QueueStats, RenderJob, StatusUpdate};
use super::queue::FifoQueue;
use super::store::JobStore;
use crate::workers::renderer::Renderer;

#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Pause between one render finishing and the next being picked up.
    pub drain_delay: Duration,
    /// `None` lets a render run for as long as it takes.
    pub render_timeout: Option<Duration>,
    /// Reject status changes that skip or leave the lifecycle.
    pub strict_transitions: bool,
    /// How long terminal jobs are kept before the sweeper drops them.
    pub retention: time::Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            drain_delay: Duration::from_secs(1),
            render_timeout: None,
            strict_transitions: false,
            retention: time::Duration::hours(24),
        }
    }
}

struct QueueState {
    store: JobStore,
    pending: FifoQueue,
    /// Set while a driver task is alive.
    processing: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    renderer: Arc<dyn Renderer>,
    options: QueueOptions,
}

/// Render job queue with a single worker slot.
///
/// Cloning is cheap; every clone shares the same store, queue and driver.
#[derive(Clone)]
pub struct RenderQueue {
    inner: Arc<Inner>,
}

impl RenderQueue {
    pub fn new(renderer: Arc<dyn Renderer>, options: QueueOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    store: JobStore::new(),
                    pending: FifoQueue::new(),
                    processing: false,
                }),
                renderer,
                options,
            }),
        }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.inner.options
    }

    pub async fn create_job(&self, req: CreateRenderJobRequest) -> Result<RenderJob, QueueError> {
        req.validate()?;

        let (job, start_driver) = {
            let mut state = self.inner.state.lock().await;
            let job = state.store.create(req, OffsetDateTime::now_utc());
            state.pending.enqueue(job.id.clone());
            let start_driver = !state.processing;
            state.processing = true;
            (job, start_driver)
        };

        info!(
            job_id = %job.id,
            user_id = %job.user_id,
            segments = job.segments.len(),
            "Render job queued"
        );

        if start_driver {
            let queue = self.clone();
            tokio::spawn(async move { queue.drain().await });
        }

        Ok(job)
    }

    pub async fn get_job(&self, id: &str) -> Option<RenderJob> {
        self.inner.state.lock().await.store.get(id).cloned()
    }

    pub async fn get_user_jobs(&self, user_id: &str) -> Vec<RenderJob> {
        self.inner.state.lock().await.store.list_by_user(user_id)
    }

    /// Applies a status report. Unknown ids are logged and ignored (`Ok(None)`).
    ///
    /// Any status may follow any other unless strict transitions are enabled.
    /// Callers must not report again once a job is terminal.
    pub async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        update: StatusUpdate,
    ) -> Result<Option<RenderJob>, QueueError> {
        let mut state = self.inner.state.lock().await;

        let Some(job) = state.store.get_mut(id) else {
            warn!(job_id = id, status = %status, "Status update for unknown render job ignored");
            return Ok(None);
        };

        let previous = job.status;
        if self.inner.options.strict_transitions && !previous.can_transition_to(status) {
            return Err(QueueError::IllegalTransition {
                id: id.to_string(),
                from: previous,
                to: status,
            });
        }

        job.apply(status, update, OffsetDateTime::now_utc());

        if previous != status {
            info!(job_id = id, from = %previous, to = %status, progress = job.progress, "Render job status changed");
        } else {
            debug!(job_id = id, progress = job.progress, "Render job progress");
        }

        Ok(Some(job.clone()))
    }

    pub async fn get_stats(&self) -> QueueStats {
        let state = self.inner.state.lock().await;

        let mut stats = QueueStats {
            total: state.store.len(),
            queue_length: state.pending.len(),
            is_processing: state.processing,
            ..QueueStats::default()
        };

        for job in state.store.iter() {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Error => stats.error += 1,
            }
        }

        stats
    }

    /// Deletes terminal jobs that finished at least the retention window before
    /// `now`. Returns how many were removed.
    pub async fn sweep_expired(&self, now: OffsetDateTime) -> usize {
        let removed = {
            let mut state = self.inner.state.lock().await;
            state.store.remove_expired(now, self.inner.options.retention)
        };

        for id in &removed {
            debug!(job_id = %id, "Expired render job removed");
        }
        removed.len()
    }

    async fn drain(self) {
        debug!("Render queue driver started");

        while let Some(job) = self.next_job().await {
            self.run_job(job).await;
            tokio::time::sleep(self.inner.options.drain_delay).await;
        }

        debug!("Render queue empty, driver idle");
    }

    /// Pops ids until one can be started. Clears the driver flag under the same
    /// lock when the queue runs dry, so `create_job` never misses a restart.
    async fn next_job(&self) -> Option<RenderJob> {
        let strict = self.inner.options.strict_transitions;
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        while let Some(id) = state.pending.dequeue() {
            let now = OffsetDateTime::now_utc();

            let Some(job) = state.store.get_mut(&id) else {
                warn!(job_id = %id, "Queued render job has no record, skipping");
                continue;
            };

            if strict && job.status != JobStatus::Queued {
                let status = job.status;
                if job.fail(format!("Render job could not start from status {}", status), now) {
                    warn!(job_id = %id, status = %status, "Render job was not queued, marked as failed");
                } else {
                    warn!(job_id = %id, status = %status, "Render job already finished, skipping");
                }
                continue;
            }

            job.begin_processing(now);
            info!(job_id = %id, remaining = state.pending.len(), "Render job started");
            return Some(job.clone());
        }

        state.processing = false;
        None
    }

    /// Runs the render step in its own task so a panic or timeout only costs
    /// the current job.
    async fn run_job(&self, job: RenderJob) {
        let id = job.id.clone();
        let renderer = Arc::clone(&self.inner.renderer);
        let queue = self.clone();
        let mut handle = tokio::spawn(async move { renderer.render(job, queue).await });

        let outcome = match self.inner.options.render_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    warn!(job_id = %id, timeout = ?limit, "Render step timed out");
                    self.fail_job(&id, format!("Render timed out after {:?}", limit)).await;
                    return;
                }
            },
            None => handle.await,
        };

        match outcome {
            Ok(Ok(())) => debug!(job_id = %id, "Render step returned"),
            Ok(Err(e)) => {
                error!(job_id = %id, "Render step failed: {:#}", e);
                self.fail_job(&id, e.to_string()).await;
            }
            Err(e) => {
                error!(job_id = %id, "Render step aborted: {}", e);
                self.fail_job(&id, "Render step aborted unexpectedly").await;
            }
        }
    }

    async fn fail_job(&self, id: &str, message: impl Into<String>) {
        let mut state = self.inner.state.lock().await;
        if let Some(job) = state.store.get_mut(id) {
            if job.fail(message, OffsetDateTime::now_utc()) {
                warn!(job_id = id, "Render job marked as failed by the driver");
            }
        }
    }
}
