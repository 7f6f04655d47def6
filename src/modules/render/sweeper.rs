use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::service::RenderQueue;

/// Periodically evicts finished jobs older than the queue's retention window.
pub struct RetentionSweeper {
    queue: RenderQueue,
    every: Duration,
}

impl RetentionSweeper {
    pub fn new(queue: RenderQueue, every: Duration) -> Self {
        Self { queue, every }
    }

    /// Runs until `shutdown` is cancelled. Should be spawned as a background task.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval = ?self.every,
            retention_hours = self.queue.options().retention.whole_hours(),
            "Starting render job retention sweeper"
        );

        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be expired at startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Retention sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep_once(OffsetDateTime::now_utc()).await;
                }
            }
        }
    }

    pub async fn sweep_once(&self, now: OffsetDateTime) -> usize {
        let removed = self.queue.sweep_expired(now).await;
        if removed > 0 {
            info!(removed, "Removed expired render jobs");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::render::model::{JobStatus, StatusUpdate};
    use crate::modules::render::testing::{fast_options, next_start, request, scripted};

    #[tokio::test]
    async fn sweep_once_respects_the_retention_window() {
        let (renderer, mut starts) = scripted();
        let queue = RenderQueue::new(renderer, fast_options());
        let sweeper = RetentionSweeper::new(queue.clone(), Duration::from_secs(3600));

        let job = queue.create_job(request("user-1")).await.unwrap();
        let started = next_start(&mut starts).await;
        let done = queue
            .update_status(&job.id, JobStatus::Completed, StatusUpdate::completed("https://x/a.mp4"))
            .await
            .unwrap()
            .unwrap();
        started.finish();
        let completed_at = done.completed_at.unwrap();

        assert_eq!(sweeper.sweep_once(completed_at + time::Duration::hours(23)).await, 0);
        assert!(queue.get_job(&job.id).await.is_some());

        assert_eq!(sweeper.sweep_once(completed_at + time::Duration::hours(24)).await, 1);
        assert!(queue.get_job(&job.id).await.is_none());
    }

    #[tokio::test]
    async fn sweep_never_touches_unfinished_jobs() {
        let (renderer, mut starts) = scripted();
        let queue = RenderQueue::new(renderer, fast_options());
        let sweeper = RetentionSweeper::new(queue.clone(), Duration::from_secs(3600));

        let running = queue.create_job(request("user-1")).await.unwrap();
        let _started = next_start(&mut starts).await;
        let waiting = queue.create_job(request("user-1")).await.unwrap();

        let far_future = OffsetDateTime::now_utc() + time::Duration::days(365);
        assert_eq!(sweeper.sweep_once(far_future).await, 0);
        assert_eq!(queue.get_stats().await.total, 2);
        assert!(queue.get_job(&running.id).await.is_some());
        assert!(queue.get_job(&waiting.id).await.is_some());
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let (renderer, _starts) = scripted();
        let queue = RenderQueue::new(renderer, fast_options());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(
            RetentionSweeper::new(queue, Duration::from_millis(10)).run(shutdown.clone()),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
