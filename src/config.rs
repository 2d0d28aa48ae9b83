use crate::error::AppError;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "GIF_DESCRIBER";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Host substitution applied to remote references before fetching
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DomainRewrite {
    pub from: String,
    pub to: String,
}

impl DomainRewrite {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub frame_count: usize,
    pub max_frame_dimension: u32,
    pub workers: usize,
    pub parse_retries: u32,
    pub retry_backoff_ms: u64,
    pub progress_interval: usize,
    pub fetch_timeout_secs: u64,
    pub decode_timeout_secs: u64,
    pub job_timeout_secs: Option<u64>,
    pub user_agent: String,
    pub model: String,
    pub api_base_url: String,
    pub api_key_path: PathBuf,
    pub removal_markers: Vec<String>,
    pub legacy_domains: Vec<DomainRewrite>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            frame_count: 5,
            max_frame_dimension: 512,
            workers: 20,
            parse_retries: 1,
            retry_backoff_ms: 0,
            progress_interval: 10,
            fetch_timeout_secs: 30,
            decode_timeout_secs: 60,
            job_timeout_secs: None,
            user_agent: "Mozilla/5.0".to_string(),
            model: "gemini-2.0-flash-lite".to_string(),
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_path: dirs::home_dir()
                .unwrap_or_default()
                .join(".tokens")
                .join("gemini_api_key"),
            removal_markers: vec!["assets.tumblr.com/images/media_violation/".to_string()],
            legacy_domains: ["38.media", "33.media", "31.media"]
                .iter()
                .map(|old| DomainRewrite::new(format!("{old}.tumblr.com"), "64.media.tumblr.com"))
                .collect(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl Configuration {
    /// Layer an optional config file and `GIF_DESCRIBER_*` environment variables over the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let configuration: Configuration = settings.try_deserialize()?;
        configuration
            .validate()
            .map_err(AppError::InvalidConfig)?;
        Ok(configuration)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_count == 0 {
            return Err("Frame count must be greater than 0".to_string());
        }

        if self.max_frame_dimension == 0 {
            return Err("Max frame dimension must be greater than 0".to_string());
        }

        if self.workers == 0 {
            return Err("Worker count must be greater than 0".to_string());
        }

        if self.progress_interval == 0 {
            return Err("Progress interval must be greater than 0".to_string());
        }

        if self.job_timeout_secs == Some(0) {
            return Err("Job timeout must be greater than 0 when set".to_string());
        }

        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_secs)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// `GEMINI_API_KEY` wins over the key file; the file's first whitespace-separated token is the key
    pub fn load_api_key(&self) -> Result<String, AppError> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim();
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }

        let contents =
            std::fs::read_to_string(&self.api_key_path).map_err(|source| AppError::Credential {
                path: self.api_key_path.clone(),
                source,
            })?;
        contents
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| AppError::EmptyCredential(self.api_key_path.clone()))
    }
}
