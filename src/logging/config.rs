use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Console output targets supported by the logging configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleOutput {
    /// Stream logs to stdout.
    Stdout,
    /// Stream logs to stderr.
    #[default]
    Stderr,
    /// Disable console logging entirely.
    None,
}

/// Parsed logging configuration that mirrors the supported `[logging]` keys in `pipeline.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfigFile {
    /// Custom log directory from `logging.log_dir`.
    pub log_dir: Option<PathBuf>,
    /// Default log level from `logging.default_level`.
    pub default_level: Option<String>,
    /// Whether file logging is enabled via `logging.enable_file`.
    pub enable_file: Option<bool>,
    /// Target for console logging from `logging.console_output`.
    pub console_output: Option<ConsoleOutput>,
}

impl LoggingConfigFile {
    fn from_table(table: LoggingTable) -> Self {
        LoggingConfigFile {
            log_dir: table.log_dir.map(PathBuf::from),
            default_level: table.default_level,
            enable_file: table.enable_file,
            console_output: table.console_output,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoggingToml {
    logging: Option<LoggingTable>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct LoggingTable {
    log_dir: Option<String>,
    default_level: Option<String>,
    enable_file: Option<bool>,
    console_output: Option<ConsoleOutput>,
}

/// Loads the `[logging]` table out of `pipeline.toml`, returning `Ok(None)` when the file is
/// absent entirely.
pub fn load_logging_config(path: &Path) -> Result<Option<LoggingConfigFile>> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(anyhow!(
                "failed to read logging config {}: {}",
                path.display(),
                err
            ))
        }
    };

    let parsed: LoggingToml = toml::from_str(&content)
        .with_context(|| format!("failed to parse logging config {}", path.display()))?;

    Ok(parsed.logging.map(LoggingConfigFile::from_table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        let result = load_logging_config(&dir.path().join("pipeline.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn parses_logging_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(
            &path,
            r#"
            [logging]
            log_dir = "/tmp/pipeline-logs"
            default_level = "debug"
            enable_file = true
            console_output = "stdout"
            "#,
        )
        .unwrap();

        let parsed = load_logging_config(&path).unwrap().unwrap();
        assert_eq!(parsed.log_dir, Some(PathBuf::from("/tmp/pipeline-logs")));
        assert_eq!(parsed.default_level.as_deref(), Some("debug"));
        assert_eq!(parsed.enable_file, Some(true));
        assert_eq!(parsed.console_output, Some(ConsoleOutput::Stdout));
    }

    #[test]
    fn missing_logging_table_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(&path, "max_workers = 4\n").unwrap();
        let parsed = load_logging_config(&path).unwrap();
        assert!(parsed.is_none());
    }
}
