use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::env::{self, ConfigError, EnvKey, EnvReader};
use crate::modules::render::service::QueueOptions;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub minio_url: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub render_work_dir: PathBuf,
    pub render_drain_delay_ms: u64,
    /// Zero disables the render timeout.
    pub render_timeout_secs: u64,
    pub render_strict_transitions: bool,
    /// At least one hour.
    pub job_retention_hours: u32,
    pub job_sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_env(&env::from_process())
    }

    pub fn from_env<F>(vars: &EnvReader<F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_work_dir = std::env::temp_dir().to_string_lossy().into_owned();

        let job_retention_hours: u32 = vars.parsed(EnvKey::JobRetentionHours, 24)?;
        if job_retention_hours == 0 {
            return Err(ConfigError::Invalid {
                key: EnvKey::JobRetentionHours.as_str(),
                value: job_retention_hours.to_string(),
                reason: "retention must be at least one hour",
            });
        }

        Ok(Self {
            server_port: vars.parsed(EnvKey::ServerPort, 3000)?,
            minio_url: vars.require(EnvKey::MinioUrl)?,
            minio_bucket: vars.require(EnvKey::MinioBucket)?,
            minio_access_key: vars.require(EnvKey::MinioAccessKey)?,
            minio_secret_key: vars.require(EnvKey::MinioSecretKey)?,
            ffmpeg_path: vars.get_or(EnvKey::FfmpegPath, "ffmpeg"),
            ffprobe_path: vars.get_or(EnvKey::FfprobePath, "ffprobe"),
            render_work_dir: PathBuf::from(vars.get_or(EnvKey::RenderWorkDir, &default_work_dir)),
            render_drain_delay_ms: vars.parsed(EnvKey::RenderDrainDelayMs, 1000)?,
            render_timeout_secs: vars.parsed(EnvKey::RenderTimeoutSecs, 0)?,
            render_strict_transitions: vars.flag(EnvKey::RenderStrictTransitions, false)?,
            job_retention_hours,
            job_sweep_interval_secs: vars.parsed(EnvKey::JobSweepIntervalSecs, 3600)?,
        })
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            drain_delay: Duration::from_millis(self.render_drain_delay_ms),
            render_timeout: (self.render_timeout_secs > 0)
                .then(|| Duration::from_secs(self.render_timeout_secs)),
            strict_transitions: self.render_strict_transitions,
            retention: time::Duration::hours(i64::from(self.job_retention_hours)),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.job_sweep_interval_secs.max(1))
    }
}
