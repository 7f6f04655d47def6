use crate::config::settings::AppConfig;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::render::service::RenderQueue;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub storage: StorageService,
    pub jobs: RenderQueue,
}

impl AppState {
    pub fn new(config: AppConfig, storage: StorageService, jobs: RenderQueue) -> Self {
        Self {
            config,
            storage,
            jobs,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State backed by an unreachable local storage endpoint.
    pub async fn for_tests(jobs: RenderQueue) -> Self {
        let config = AppConfig {
            server_port: 0,
            minio_url: "http://127.0.0.1:9".to_string(),
            minio_bucket: "videos".to_string(),
            minio_access_key: "test".to_string(),
            minio_secret_key: "test".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            render_work_dir: std::env::temp_dir(),
            render_drain_delay_ms: 5,
            render_timeout_secs: 0,
            render_strict_transitions: false,
            job_retention_hours: 24,
            job_sweep_interval_secs: 3600,
        };
        let storage = StorageService::new(
            &config.minio_url,
            &config.minio_bucket,
            &config.minio_access_key,
            &config.minio_secret_key,
        )
        .expect("test storage endpoint is valid");

        Self::new(config, storage, jobs)
    }
}
