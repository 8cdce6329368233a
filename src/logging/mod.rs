pub mod config;
pub mod layers;

use crate::logging::config::{load_logging_config, ConsoleOutput, LoggingConfigFile};
use crate::logging::layers as layers_mod;
use crate::logging::layers::{console, file};
use crate::Result;
use anyhow::Context;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::Layered, prelude::*, registry::Registry, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "info";
const CONFIG_RELATIVE_PATH: &str = "pipeline.toml";
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Guard that keeps the non-blocking file writer alive for the duration of the process.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    fn new(file_guard: Option<WorkerGuard>) -> Self {
        LoggingGuard {
            _file_guard: file_guard,
        }
    }
}

/// Initialize the console + file tracing subscriber for a command running against
/// `workspace_root` (`None` when no workspace could be resolved, e.g. commands run outside any
/// `pipeline.toml` directory).
pub fn init(workspace_root: Option<&Path>) -> Result<LoggingGuard> {
    if LOGGING_INITIALIZED.load(Ordering::SeqCst) {
        return Err(anyhow::anyhow!("logging already initialized"));
    }

    let config = workspace_root
        .map(|root| load_logging_config(&root.join(CONFIG_RELATIVE_PATH)))
        .transpose()?
        .flatten();

    let settings = build_effective_settings(workspace_root, config.as_ref())?;

    let filter = EnvFilter::try_new(&settings.log_level)
        .with_context(|| format!("failed to create log filter from '{}'", settings.log_level))?;

    let subscriber = Registry::default();

    let mut file_guard = None;
    let file_layer = if settings.file_enabled {
        fs::create_dir_all(&settings.log_dir).with_context(|| {
            format!(
                "failed to create log directory {}",
                settings.log_dir.display()
            )
        })?;
        let (layer, guard) = file::file_layer::<Registry>(&settings.log_file, true)?;
        file_guard = guard;
        Box::new(layer) as layers_mod::BoxLayer<Registry>
    } else {
        layers_mod::noop_layer::<Registry>()
    };
    type AfterFile = Layered<layers_mod::BoxLayer<Registry>, Registry>;
    let subscriber = file_layer.with_subscriber(subscriber);

    let console_layer =
        if let Some(layer) = console::build_console_layer::<AfterFile>(settings.console_output) {
            layer
        } else {
            layers_mod::noop_layer::<AfterFile>()
        };
    let subscriber = console_layer.with_subscriber(subscriber);
    let subscriber = subscriber.with(filter);

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber; check logging configuration")?;

    LOGGING_INITIALIZED.store(true, Ordering::SeqCst);

    Ok(LoggingGuard::new(file_guard))
}

#[derive(Debug)]
pub(crate) struct EffectiveLoggingSettings {
    pub log_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
    pub file_enabled: bool,
    pub console_output: ConsoleOutput,
}

pub(crate) fn build_effective_settings(
    workspace: Option<&Path>,
    config: Option<&LoggingConfigFile>,
) -> Result<EffectiveLoggingSettings> {
    let log_dir = determine_log_dir(workspace, config)?;
    let log_file = log_dir.join("pipeline.log");
    let log_level = select_log_level(config);
    let file_enabled = select_file_enabled(config);
    let console_output = select_console_output(config);

    Ok(EffectiveLoggingSettings {
        log_dir,
        log_file,
        log_level,
        file_enabled,
        console_output,
    })
}

fn determine_log_dir(
    workspace: Option<&Path>,
    config: Option<&LoggingConfigFile>,
) -> Result<PathBuf> {
    let pipeline_root = match workspace {
        Some(root) => root.join(".pipeline"),
        None => dirs_next::home_dir()
            .ok_or_else(|| anyhow::anyhow!("home directory not configured; cannot resolve log path"))?
            .join(".pipeline"),
    };

    if let Some(cfg) = config {
        if let Some(ref custom_dir) = cfg.log_dir {
            return Ok(normalize_path(&pipeline_root, custom_dir));
        }
    }

    Ok(pipeline_root.join("logs"))
}

fn select_log_level(config: Option<&LoggingConfigFile>) -> String {
    env::var("PIPELINE_LOG_LEVEL")
        .ok()
        .or_else(|| env::var("RUST_LOG").ok())
        .and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .or_else(|| {
            config
                .and_then(|cfg| cfg.default_level.as_deref())
                .map(str::trim)
                .filter(|trimmed| !trimmed.is_empty())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

fn select_file_enabled(config: Option<&LoggingConfigFile>) -> bool {
    config.and_then(|cfg| cfg.enable_file).unwrap_or(true)
}

fn select_console_output(config: Option<&LoggingConfigFile>) -> ConsoleOutput {
    config.and_then(|cfg| cfg.console_output).unwrap_or_default()
}

fn normalize_path(base: &Path, candidate: &Path) -> PathBuf {
    if candidate.is_absolute() {
        clean_absolute(candidate)
    } else {
        clean_relative_within(base, candidate)
    }
}

fn clean_absolute(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::RootDir | Component::Prefix(_) => normalized.push(component.as_os_str()),
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

fn clean_relative_within(base: &Path, path: &Path) -> PathBuf {
    let mut normalized = base.to_path_buf();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
            Component::RootDir | Component::Prefix(_) => normalized.push(component.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn log_level_prefers_pipeline_env_over_rust_log() {
        env::set_var("PIPELINE_LOG_LEVEL", "debug");
        env::set_var("RUST_LOG", "warn");
        assert_eq!(select_log_level(None), "debug");
        env::remove_var("PIPELINE_LOG_LEVEL");
        env::remove_var("RUST_LOG");
    }

    #[test]
    fn log_level_falls_back_to_default() {
        env::remove_var("PIPELINE_LOG_LEVEL");
        env::remove_var("RUST_LOG");
        assert_eq!(select_log_level(None), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn log_dir_defaults_under_workspace_pipeline_dir() {
        let dir = TempDir::new().unwrap();
        let log_dir = determine_log_dir(Some(dir.path()), None).unwrap();
        assert!(log_dir.ends_with(".pipeline/logs"));
    }

    #[test]
    fn custom_log_dir_is_normalized_relative_to_pipeline_root() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfigFile {
            log_dir: Some(PathBuf::from("custom/logs")),
            default_level: None,
            enable_file: None,
            console_output: None,
        };
        let log_dir = determine_log_dir(Some(dir.path()), Some(&config)).unwrap();
        assert!(log_dir.ends_with(".pipeline/custom/logs"));
    }

    #[test]
    fn file_enabled_defaults_to_true() {
        assert!(select_file_enabled(None));
    }
}
