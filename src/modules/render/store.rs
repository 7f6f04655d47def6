use std::collections::HashMap;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::dto::CreateRenderJobRequest;
use super::model::{JobStatus, RenderJob};

/// In-memory job records keyed by id. Holds no locks of its own; the owning
/// [`RenderQueue`](super::service::RenderQueue) serializes access.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: HashMap<String, RenderJob>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, req: CreateRenderJobRequest, now: OffsetDateTime) -> RenderJob {
        let job = RenderJob {
            id: generate_job_id(now),
            user_id: req.user_id,
            file_id: req.file_id,
            source_url: req.source_url,
            segments: req.segments,
            status: JobStatus::Queued,
            progress: 0,
            result_url: None,
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        };

        self.jobs.insert(job.id.clone(), job.clone());
        job
    }

    pub fn get(&self, id: &str) -> Option<&RenderJob> {
        self.jobs.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut RenderJob> {
        self.jobs.get_mut(id)
    }

    /// Jobs owned by `user_id`, oldest first.
    pub fn list_by_user(&self, user_id: &str) -> Vec<RenderJob> {
        let mut jobs: Vec<RenderJob> = self
            .jobs
            .values()
            .filter(|job| job.user_id == user_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub fn delete(&mut self, id: &str) -> Option<RenderJob> {
        self.jobs.remove(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderJob> {
        self.jobs.values()
    }

    /// Drops terminal jobs whose `completed_at` is at least `retention` old and
    /// returns their ids.
    pub fn remove_expired(&mut self, now: OffsetDateTime, retention: Duration) -> Vec<String> {
        let expired: Vec<String> = self
            .jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .filter(|job| matches!(job.completed_at, Some(done) if now - done >= retention))
            .map(|job| job.id.clone())
            .collect();

        for id in &expired {
            self.jobs.remove(id);
        }
        expired
    }
}

fn generate_job_id(now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let suffix = Uuid::new_v4().simple().to_string();
    format!("job_{}_{}", millis, &suffix[..9])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::render::model::StatusUpdate;
    use time::macros::datetime;

    fn request(user: &str) -> CreateRenderJobRequest {
        CreateRenderJobRequest {
            user_id: user.to_string(),
            file_id: "file-1".to_string(),
            source_url: "https://cdn.example.com/tape.mp4".to_string(),
            segments: vec![],
        }
    }

    #[test]
    fn create_stores_a_queued_job() {
        let mut store = JobStore::new();
        let now = datetime!(2024-03-01 10:00 UTC);

        let job = store.create(request("user-1"), now);

        assert!(job.id.starts_with("job_1709287200000_"));
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.started_at.is_none() && job.completed_at.is_none());
        assert_eq!(store.get(&job.id).map(|j| j.created_at), Some(now));
    }

    #[test]
    fn ids_are_unique_within_the_same_millisecond() {
        let mut store = JobStore::new();
        let now = datetime!(2024-03-01 10:00 UTC);

        let a = store.create(request("user-1"), now);
        let b = store.create(request("user-1"), now);

        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn list_by_user_filters_and_orders() {
        let mut store = JobStore::new();
        let first = store.create(request("user-1"), datetime!(2024-03-01 10:00 UTC));
        store.create(request("user-2"), datetime!(2024-03-01 10:01 UTC));
        let third = store.create(request("user-1"), datetime!(2024-03-01 10:02 UTC));

        let ids: Vec<String> = store.list_by_user("user-1").into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![first.id, third.id]);
        assert!(store.list_by_user("nobody").is_empty());
    }

    #[test]
    fn delete_removes_the_record() {
        let mut store = JobStore::new();
        let job = store.create(request("user-1"), datetime!(2024-03-01 10:00 UTC));

        assert!(store.delete(&job.id).is_some());
        assert!(store.get(&job.id).is_none());
        assert!(store.delete(&job.id).is_none());
    }

    #[test]
    fn remove_expired_honours_the_retention_boundary() {
        let mut store = JobStore::new();
        let done = datetime!(2024-03-01 12:00 UTC);
        let retention = Duration::hours(24);

        let completed = store.create(request("user-1"), datetime!(2024-03-01 10:00 UTC));
        let failed = store.create(request("user-1"), datetime!(2024-03-01 10:00 UTC));
        let running = store.create(request("user-1"), datetime!(2024-03-01 10:00 UTC));
        store
            .get_mut(&completed.id)
            .unwrap()
            .apply(JobStatus::Completed, StatusUpdate::completed("https://x/a.mp4"), done);
        store
            .get_mut(&failed.id)
            .unwrap()
            .apply(JobStatus::Error, StatusUpdate::failed("boom"), done + Duration::minutes(1));
        store.get_mut(&running.id).unwrap().begin_processing(done);

        let early = store.remove_expired(done + Duration::hours(24) - Duration::seconds(1), retention);
        assert!(early.is_empty());

        let removed = store.remove_expired(done + Duration::hours(24), retention);
        assert_eq!(removed, vec![completed.id.clone()]);

        let removed = store.remove_expired(done + Duration::days(30), retention);
        assert_eq!(removed, vec![failed.id]);
        assert_eq!(store.len(), 1);
        assert!(store.get(&running.id).is_some());
    }
}
