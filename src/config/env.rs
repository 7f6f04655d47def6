use std::env;
use std::str::FromStr;

use thiserror::Error;

pub enum EnvKey {
    ServerPort,
    MinioUrl,
    MinioBucket,
    MinioAccessKey,
    MinioSecretKey,
    FfmpegPath,
    FfprobePath,
    RenderWorkDir,
    RenderDrainDelayMs,
    RenderTimeoutSecs,
    RenderStrictTransitions,
    JobRetentionHours,
    JobSweepIntervalSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::RenderWorkDir => "RENDER_WORK_DIR",
            EnvKey::RenderDrainDelayMs => "RENDER_DRAIN_DELAY_MS",
            EnvKey::RenderTimeoutSecs => "RENDER_TIMEOUT_SECS",
            EnvKey::RenderStrictTransitions => "RENDER_STRICT_TRANSITIONS",
            EnvKey::JobRetentionHours => "JOB_RETENTION_HOURS",
            EnvKey::JobSweepIntervalSecs => "JOB_SWEEP_INTERVAL_SECS",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Reads configuration values through `lookup`.
pub struct EnvReader<F> {
    lookup: F,
}

/// Reader over the process environment.
pub fn from_process() -> EnvReader<impl Fn(&str) -> Option<String>> {
    EnvReader::new(|key: &str| env::var(key).ok())
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    /// Set and non-blank values only.
    fn raw(&self, key: &EnvKey) -> Option<String> {
        (self.lookup)(key.as_str()).filter(|val| !val.trim().is_empty())
    }

    pub fn require(&self, key: EnvKey) -> Result<String, ConfigError> {
        self.raw(&key).ok_or(ConfigError::Missing(key.as_str()))
    }

    pub fn get_or(&self, key: EnvKey, default: &str) -> String {
        self.raw(&key).unwrap_or_else(|| default.to_string())
    }

    /// `default` when unset; an error when set to something that does not parse.
    pub fn parsed<T: FromStr>(&self, key: EnvKey, default: T) -> Result<T, ConfigError> {
        match self.raw(&key) {
            None => Ok(default),
            Some(val) => val.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
                key: key.as_str(),
                value: val,
                reason: "not a valid number",
            }),
        }
    }

    /// Accepts `true/false`, `1/0`, `yes/no` and `on/off`, in any case.
    pub fn flag(&self, key: EnvKey, default: bool) -> Result<bool, ConfigError> {
        let Some(val) = self.raw(&key) else {
            return Ok(default);
        };

        match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key: key.as_str(),
                value: val,
                reason: "expected true or false",
            }),
        }
    }
}
