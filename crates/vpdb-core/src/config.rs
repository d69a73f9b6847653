//! Configuration module
//!
//! Environment-driven configuration for the pipeline: database, storage root,
//! upload limits, extractor binaries and the background worker pool.

use std::env;
use std::time::Duration;

use crate::models::{UploadPolicy, MIME_TYPES};

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Settings shared by every binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub environment: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// `json` or `pretty`.
    pub log_format: String,
}

/// File pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub base: BaseConfig,
    pub database_url: String,
    pub storage_path: String,
    pub max_file_size_bytes: u64,
    pub allowed_mime_types: Vec<String>,
    /// Upper bound for synchronous metadata extraction during upload.
    pub metadata_timeout_secs: u64,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub worker_max_workers: usize,
    pub worker_queue_capacity: usize,
    /// 0 disables the per-task timeout.
    pub worker_task_timeout_secs: u64,
    pub worker_max_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig {
                environment: "development".to_string(),
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                log_format: "pretty".to_string(),
            },
            database_url: "postgresql://localhost/vpdb".to_string(),
            storage_path: "./data/storage".to_string(),
            max_file_size_bytes: 500 * 1024 * 1024,
            allowed_mime_types: MIME_TYPES.iter().map(|e| e.mime_type.to_string()).collect(),
            metadata_timeout_secs: 30,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            worker_max_workers: 4,
            worker_queue_capacity: 256,
            worker_task_timeout_secs: 0,
            worker_max_retries: 2,
        }
    }
}

/// Split a comma separated list, dropping empty entries.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MAX_FILE_SIZE_MB: u64 = 500;
        const METADATA_TIMEOUT_SECS: u64 = 30;
        const WORKER_MAX_WORKERS: usize = 4;
        const WORKER_QUEUE_CAPACITY: usize = 256;
        const WORKER_TASK_TIMEOUT_SECS: u64 = 0;
        const WORKER_MAX_RETRIES: u32 = 2;

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let allowed_mime_types = env::var("ALLOWED_MIME_TYPES")
            .map(|v| parse_list(&v))
            .unwrap_or_else(|_| MIME_TYPES.iter().map(|e| e.mime_type.to_string()).collect());

        let ffmpeg_path = env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string());
        let ffprobe_path =
            env::var("FFPROBE_PATH").unwrap_or_else(|_| ffmpeg_path.replace("ffmpeg", "ffprobe"));

        let base = BaseConfig {
            environment,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        };

        Ok(PipelineConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_path: env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "./data/storage".to_string()),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_mime_types,
            metadata_timeout_secs: env::var("METADATA_TIMEOUT_SECS")
                .unwrap_or_else(|_| METADATA_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(METADATA_TIMEOUT_SECS),
            ffmpeg_path,
            ffprobe_path,
            worker_max_workers: env::var("WORKER_MAX_WORKERS")
                .unwrap_or_else(|_| WORKER_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(WORKER_MAX_WORKERS),
            worker_queue_capacity: env::var("WORKER_QUEUE_CAPACITY")
                .unwrap_or_else(|_| WORKER_QUEUE_CAPACITY.to_string())
                .parse()
                .unwrap_or(WORKER_QUEUE_CAPACITY),
            worker_task_timeout_secs: env::var("WORKER_TASK_TIMEOUT_SECS")
                .unwrap_or_else(|_| WORKER_TASK_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(WORKER_TASK_TIMEOUT_SECS),
            worker_max_retries: env::var("WORKER_MAX_RETRIES")
                .unwrap_or_else(|_| WORKER_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(WORKER_MAX_RETRIES),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.storage_path.trim().is_empty() {
            return Err(anyhow::anyhow!("STORAGE_PATH must not be empty"));
        }

        if self.allowed_mime_types.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_MIME_TYPES must list at least one MIME type"
            ));
        }

        if self.metadata_timeout_secs == 0 {
            return Err(anyhow::anyhow!("METADATA_TIMEOUT_SECS must be greater than 0"));
        }

        if self.worker_max_workers == 0 || self.worker_queue_capacity == 0 {
            return Err(anyhow::anyhow!(
                "WORKER_MAX_WORKERS and WORKER_QUEUE_CAPACITY must be greater than 0"
            ));
        }

        for path in [&self.ffmpeg_path, &self.ffprobe_path] {
            let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
            if path.chars().any(|c| dangerous_chars.contains(&c)) {
                return Err(anyhow::anyhow!(
                    "Invalid binary path {:?}: contains dangerous characters",
                    path
                ));
            }
        }

        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PipelineConfig>);

impl Default for Config {
    fn default() -> Self {
        Config(Box::default())
    }
}

impl Config {
    fn as_pipeline(&self) -> &PipelineConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_pipeline().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PipelineConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_pipeline().validate()
    }

    pub fn database_url(&self) -> &str {
        &self.as_pipeline().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_pipeline().base.db_max_connections
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.as_pipeline().base.db_timeout_seconds)
    }

    pub fn log_format(&self) -> &str {
        &self.as_pipeline().base.log_format
    }

    pub fn storage_path(&self) -> &str {
        &self.as_pipeline().storage_path
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            allowed_mime_types: self.as_pipeline().allowed_mime_types.clone(),
            max_file_size_bytes: self.as_pipeline().max_file_size_bytes,
        }
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.as_pipeline().metadata_timeout_secs)
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.as_pipeline().ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.as_pipeline().ffprobe_path
    }

    pub fn worker_max_workers(&self) -> usize {
        self.as_pipeline().worker_max_workers
    }

    pub fn worker_queue_capacity(&self) -> usize {
        self.as_pipeline().worker_queue_capacity
    }

    /// Per-task timeout for background work; `None` when disabled.
    pub fn worker_task_timeout(&self) -> Option<Duration> {
        match self.as_pipeline().worker_task_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn worker_max_retries(&self) -> u32 {
        self.as_pipeline().worker_max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_production());
        assert_eq!(config.worker_task_timeout(), None);
        assert_eq!(config.metadata_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_non_postgres_database_url() {
        let mut pipeline = PipelineConfig::default();
        pipeline.database_url = "mysql://localhost/vpdb".to_string();
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn rejects_shell_metacharacters_in_binary_paths() {
        let mut pipeline = PipelineConfig::default();
        pipeline.ffprobe_path = "ffprobe; rm -rf /".to_string();
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn parse_list_trims_and_lowercases() {
        assert_eq!(
            parse_list(" Image/PNG, ,video/mp4 "),
            vec!["image/png".to_string(), "video/mp4".to_string()]
        );
    }

    #[test]
    fn upload_policy_uses_configured_limits() {
        let mut pipeline = PipelineConfig::default();
        pipeline.allowed_mime_types = vec!["image/png".to_string()];
        pipeline.max_file_size_bytes = 1024;
        let policy = Config(Box::new(pipeline)).upload_policy();
        assert!(policy.allows("image/png"));
        assert!(!policy.allows("image/jpeg"));
        assert_eq!(policy.max_file_size_bytes, 1024);
    }

    #[test]
    fn zero_task_timeout_disables_it() {
        let mut pipeline = PipelineConfig::default();
        pipeline.worker_task_timeout_secs = 90;
        let config = Config(Box::new(pipeline));
        assert_eq!(config.worker_task_timeout(), Some(Duration::from_secs(90)));
    }
}
