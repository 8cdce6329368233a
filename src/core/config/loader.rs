use super::PipelineConfig;
use crate::core::error::{AppError, ErrorKind};
use std::env;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from `<workspace>/pipeline.toml`, then apply environment overrides.
    /// Returns defaults when the file doesn't exist.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<PipelineConfig, AppError> {
        let config_path = workspace_path.join("pipeline.toml");
        let config_file = Self::load_from_file(&config_path)?;
        let mut config = config_file.unwrap_or_default();
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Load config from a specific file path. Returns `Ok(None)` if the file doesn't exist.
    pub fn load_from_file(path: &Path) -> Result<Option<PipelineConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorKind::TransientIo,
                format!("failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: PipelineConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorKind::Validation,
                format!("failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides; environment takes precedence over the file.
    fn apply_env_overrides(config: &mut PipelineConfig) {
        if let Ok(value) = env::var("PIPELINE_MAX_WORKERS") {
            if let Ok(parsed) = value.parse::<usize>() {
                config.max_workers = parsed;
            }
        }

        if let Ok(value) = env::var("PIPELINE_MAX_RETRIES") {
            if let Ok(parsed) = value.parse::<u32>() {
                config.max_retries = parsed;
            }
        }

        if let Ok(value) = env::var("PIPELINE_RETRY_DELAY_SECONDS") {
            if let Ok(parsed) = value.parse::<u64>() {
                config.retry_delay_seconds = parsed;
            }
        }

        if let Ok(value) = env::var("PIPELINE_STATE_DIR") {
            config.state_dir = PathBuf::from(value);
        }

        if let Ok(value) = env::var("PIPELINE_CACHE_DIR") {
            config.cache_dir = PathBuf::from(value);
        }

        if let Ok(value) = env::var("PIPELINE_CACHE_TTL_SECONDS") {
            if let Ok(parsed) = value.parse::<u64>() {
                config.cache_ttl_seconds = parsed;
            }
        }
    }

    /// Documentation for supported environment variables, surfaced by `pipeline run --help`.
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "PIPELINE_MAX_WORKERS - Override the bounded worker pool size (default: 4)",
            "PIPELINE_MAX_RETRIES - Override the default per-task retry ceiling (default: 3)",
            "PIPELINE_RETRY_DELAY_SECONDS - Override the linear backoff unit, in seconds (default: 5)",
            "PIPELINE_STATE_DIR - Override where workflow state snapshots are persisted",
            "PIPELINE_CACHE_DIR - Override where cached artifacts are stored",
            "PIPELINE_CACHE_TTL_SECONDS - Override the default artifact cache TTL, in seconds",
        ]
    }

    /// Validate configuration invariants beyond what serde can enforce at parse time.
    pub fn validate_config(config: &PipelineConfig) -> Result<(), AppError> {
        if config.max_workers == 0 {
            return Err(AppError::new(
                ErrorKind::Validation,
                "max_workers must be at least 1",
            ));
        }
        if config.state_dir.as_os_str().is_empty() {
            return Err(AppError::new(
                ErrorKind::Validation,
                "state_dir cannot be empty",
            ));
        }
        if config.cache_dir.as_os_str().is_empty() {
            return Err(AppError::new(
                ErrorKind::Validation,
                "cache_dir cannot be empty",
            ));
        }
        Ok(())
    }
}
