//! Command implementations dispatched by [`crate::cli::run`]. Each builds a fresh
//! [`Orchestrator`] against the resolved workspace and exits with the process code documented in
//! the `run`/`resume` help text: `0` success, `1` workflow failed, `2` construction error, `130`
//! cancelled by signal.

use crate::cli::args::{
    CancelArgs, CleanupArgs, ListArgs, PauseArgs, ReportArgs, ReportFormat, ResumeArgs, RunArgs, StatusArgs,
    WorkspaceArgs,
};
use crate::cli::workflow_file::load_workflow_file;
use crate::core::config::{ConfigLoader, PipelineConfig};
use crate::core::error::AppError;
use crate::core::model::{WorkflowState, WorkflowStatus};
use crate::core::notifier::{LoggingNotificationSink, RetryPolicy};
use crate::core::tasks::default_registry;
use crate::core::{ArtifactCache, Orchestrator, StateStore};
use crate::Result;
use anyhow::Context;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

fn resolve_workspace(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            Ok(crate::core::find_workspace_root(&cwd))
        }
    }
}

/// Apply CLI flag overrides, the highest-precedence layer above defaults, `pipeline.toml`, and
/// `PIPELINE_*` environment variables.
fn apply_cli_overrides(config: &mut PipelineConfig, overrides: &WorkspaceArgs) {
    if let Some(max_workers) = overrides.max_workers {
        config.max_workers = max_workers;
    }
    if let Some(max_retries) = overrides.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(retry_delay_seconds) = overrides.retry_delay_seconds {
        config.retry_delay_seconds = retry_delay_seconds;
    }
    if let Some(ref state_dir) = overrides.state_dir {
        config.state_dir = state_dir.clone();
    }
    if let Some(ref cache_dir) = overrides.cache_dir {
        config.cache_dir = cache_dir.clone();
    }
    if let Some(cache_ttl_seconds) = overrides.cache_ttl_seconds {
        config.cache_ttl_seconds = cache_ttl_seconds;
    }
}

fn build_orchestrator(workspace_root: &Path, overrides: &WorkspaceArgs) -> Result<Orchestrator> {
    let mut config = ConfigLoader::load_from_workspace(workspace_root).map_err(anyhow::Error::from)?;
    apply_cli_overrides(&mut config, overrides);
    ConfigLoader::validate_config(&config).map_err(anyhow::Error::from)?;

    let state_store = Arc::new(StateStore::new(workspace_root.join(&config.state_dir)));
    let cache = Arc::new(ArtifactCache::new(workspace_root.join(&config.cache_dir)));
    let registry = default_registry();
    let retry_policy = RetryPolicy::new(config.max_retries, config.retry_delay());
    let notifier = Arc::new(LoggingNotificationSink);

    Ok(Orchestrator::new(
        workspace_root.to_path_buf(),
        state_store,
        cache,
        registry,
        config.max_workers,
        retry_policy,
        notifier,
    ))
}

/// Drive `fut` to completion, cancelling `workflow_id` and letting it wind down if Ctrl-C
/// arrives first.
async fn drive_with_signal<F>(
    orchestrator: &Orchestrator,
    workflow_id: Uuid,
    fut: F,
) -> Result<WorkflowState>
where
    F: Future<Output = std::result::Result<WorkflowState, AppError>>,
{
    tokio::pin!(fut);
    tokio::select! {
        result = &mut fut => result.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            let _ = orchestrator.cancel(workflow_id);
            fut.await.map_err(anyhow::Error::from)
        }
    }
}

fn exit_code_for(state: &WorkflowState) -> i32 {
    match state.status {
        WorkflowStatus::Completed => 0,
        WorkflowStatus::Cancelled => 130,
        _ => 1,
    }
}

pub async fn run(args: RunArgs) -> Result<i32> {
    let workspace_root = resolve_workspace(args.workspace.workspace.as_deref())?;
    let orchestrator = build_orchestrator(&workspace_root, &args.workspace)?;

    let definition = load_workflow_file(&args.workflow_file)?;
    let tasks = definition
        .tasks
        .into_iter()
        .map(|t| t.into_task())
        .collect();

    let workflow_id = match orchestrator.create(definition.name, tasks) {
        Ok(id) => id,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(2);
        }
    };
    tracing::info!(%workflow_id, "workflow created");

    let state =
        drive_with_signal(&orchestrator, workflow_id, orchestrator.execute(workflow_id)).await?;
    print_status(&state);
    Ok(exit_code_for(&state))
}

pub async fn resume(args: ResumeArgs) -> Result<i32> {
    let workspace_root = resolve_workspace(args.workspace.workspace.as_deref())?;
    let orchestrator = build_orchestrator(&workspace_root, &args.workspace)?;

    let state = drive_with_signal(
        &orchestrator,
        args.workflow_id,
        orchestrator.resume(args.workflow_id),
    )
    .await?;
    print_status(&state);
    Ok(exit_code_for(&state))
}

pub fn status(args: StatusArgs) -> Result<i32> {
    let workspace_root = resolve_workspace(args.workspace.workspace.as_deref())?;
    let orchestrator = build_orchestrator(&workspace_root, &args.workspace)?;
    let state = orchestrator
        .status(args.workflow_id)
        .map_err(anyhow::Error::from)?;
    print_status(&state);
    Ok(0)
}

pub fn cancel(args: CancelArgs) -> Result<i32> {
    let workspace_root = resolve_workspace(args.workspace.workspace.as_deref())?;
    let orchestrator = build_orchestrator(&workspace_root, &args.workspace)?;
    orchestrator
        .cancel(args.workflow_id)
        .map_err(anyhow::Error::from)?;
    println!("cancellation requested for {}", args.workflow_id);
    Ok(0)
}

pub fn pause(args: PauseArgs) -> Result<i32> {
    let workspace_root = resolve_workspace(args.workspace.workspace.as_deref())?;
    let orchestrator = build_orchestrator(&workspace_root, &args.workspace)?;
    orchestrator
        .pause(args.workflow_id)
        .map_err(anyhow::Error::from)?;
    println!("pause requested for {}", args.workflow_id);
    Ok(0)
}

pub fn list(args: ListArgs) -> Result<i32> {
    let workspace_root = resolve_workspace(args.workspace.workspace.as_deref())?;
    let orchestrator = build_orchestrator(&workspace_root, &args.workspace)?;
    let workflows = orchestrator.list().map_err(anyhow::Error::from)?;
    if workflows.is_empty() {
        println!("no workflows found");
    }
    for state in workflows {
        println!(
            "{}  {:<10}  {:>6.1}%  {}",
            state.workflow_id, state.status_label(), state.progress, state.name
        );
    }
    Ok(0)
}

pub fn cleanup(args: CleanupArgs) -> Result<i32> {
    let workspace_root = resolve_workspace(args.workspace.workspace.as_deref())?;
    let orchestrator = build_orchestrator(&workspace_root, &args.workspace)?;

    let older_than_std = humantime::parse_duration(&args.older_than)
        .with_context(|| format!("invalid --older-than value '{}'", args.older_than))?;
    let older_than = chrono::Duration::from_std(older_than_std)
        .context("--older-than duration is out of range")?;

    let (workflows_removed, cache_entries_removed) = orchestrator
        .cleanup(older_than, older_than_std)
        .map_err(anyhow::Error::from)?;
    println!(
        "removed {workflows_removed} workflow(s) and {cache_entries_removed} cache entr(y/ies) older than {}",
        args.older_than
    );
    Ok(0)
}

pub fn report(args: ReportArgs) -> Result<i32> {
    let workspace_root = resolve_workspace(args.workspace.workspace.as_deref())?;
    let orchestrator = build_orchestrator(&workspace_root, &args.workspace)?;
    let state = orchestrator
        .status(args.workflow_id)
        .map_err(anyhow::Error::from)?;

    match args.format {
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        ReportFormat::Text => print_report_text(&state),
    }
    Ok(0)
}

fn print_status(state: &WorkflowState) {
    println!(
        "workflow {} [{}] {:.1}% complete",
        state.workflow_id,
        state.status_label(),
        state.progress
    );
    for task in state.tasks.values() {
        match &task.error {
            Some(err) => println!(
                "  {:<20} {:<10} {} ({})",
                task.task_id,
                format!("{:?}", task.status),
                err.message,
                err.kind
            ),
            None => println!("  {:<20} {:<10}", task.task_id, format!("{:?}", task.status)),
        }
    }
}

fn print_report_text(state: &WorkflowState) {
    println!("Workflow: {} ({})", state.name, state.workflow_id);
    println!("Status:   {}", state.status_label());
    println!("Progress: {:.1}%", state.progress);
    println!("Created:  {}", state.created_at);
    if let Some(started) = state.started_at {
        println!("Started:  {started}");
    }
    if let Some(completed) = state.completed_at {
        println!("Completed: {completed}");
    }
    println!();
    println!("Tasks:");
    for task in state.tasks.values() {
        let duration = match (task.started_at, task.completed_at) {
            (Some(start), Some(end)) => format!("{}s", (end - start).num_seconds()),
            _ => "-".to_string(),
        };
        println!(
            "  {:<20} {:<10} retries={}/{} duration={}",
            task.task_id,
            format!("{:?}", task.status),
            task.retry_count,
            task.max_retries,
            duration
        );
        if let Some(err) = &task.error {
            println!("      error: [{}] {}", err.kind, err.message);
        }
    }
}

trait StatusLabel {
    fn status_label(&self) -> String;
}

impl StatusLabel for WorkflowState {
    fn status_label(&self) -> String {
        format!("{:?}", self.status)
    }
}
