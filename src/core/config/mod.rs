mod loader;

pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Layered pipeline configuration: built-in defaults -> `pipeline.toml` -> environment -> CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

impl PipelineConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

fn default_max_workers() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    5
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".pipeline/state")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".pipeline/cache")
}

fn default_cache_ttl_seconds() -> u64 {
    24 * 3600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_workers: default_max_workers(),
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
            state_dir: default_state_dir(),
            cache_dir: default_cache_dir(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.state_dir, PathBuf::from(".pipeline/state"));
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
            max_workers = 8
            max_retries = 5
            retry_delay_seconds = 10
            state_dir = "/tmp/state"
            cache_dir = "/tmp/cache"
            cache_ttl_seconds = 600
        "#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay(), Duration::from_secs(10));
        assert_eq!(config.state_dir, PathBuf::from("/tmp/state"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
    }
}
