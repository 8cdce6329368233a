use clap::Args;
use std::path::PathBuf;
use uuid::Uuid;

/// Flags shared by every subcommand for locating the workspace a workflow runs against and for
/// overriding layered configuration. CLI flags are the highest-precedence layer: they win over
/// `pipeline.toml` and `PIPELINE_*` environment variables.
#[derive(Args, Clone)]
pub struct WorkspaceArgs {
    /// Workspace root containing `pipeline.toml`, state, and cache directories.
    /// Defaults to the nearest ancestor directory containing `pipeline.toml`, falling back to
    /// the current directory.
    #[arg(long, value_name = "PATH")]
    pub workspace: Option<PathBuf>,

    /// Override the bounded worker pool size.
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Override the default per-task retry ceiling.
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Override the linear backoff unit, in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub retry_delay_seconds: Option<u64>,

    /// Override where workflow state snapshots are persisted.
    #[arg(long, value_name = "PATH")]
    pub state_dir: Option<PathBuf>,

    /// Override where cached artifacts are stored.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Override the default artifact cache TTL, in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Workflow definition file (JSON) describing tasks, dependencies, and arguments.
    #[arg(value_name = "WORKFLOW_FILE")]
    pub workflow_file: PathBuf,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

#[derive(Args)]
pub struct ResumeArgs {
    /// Workflow to resume after a crash or unclean shutdown.
    #[arg(value_name = "WORKFLOW_ID")]
    pub workflow_id: Uuid,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Workflow whose state should be printed.
    #[arg(value_name = "WORKFLOW_ID")]
    pub workflow_id: Uuid,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

#[derive(Args)]
pub struct CancelArgs {
    /// Workflow to cancel. Reaches a workflow running in this process or another.
    #[arg(value_name = "WORKFLOW_ID")]
    pub workflow_id: Uuid,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

#[derive(Args)]
pub struct PauseArgs {
    /// Workflow to pause. In-flight tasks run to completion before the run loop halts.
    #[arg(value_name = "WORKFLOW_ID")]
    pub workflow_id: Uuid,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

#[derive(Args)]
pub struct CleanupArgs {
    /// Remove terminal workflow state and expired cache entries older than this duration
    /// (e.g. "7d", "24h", "30m").
    #[arg(long, value_name = "DURATION")]
    pub older_than: String,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

#[derive(Args)]
pub struct ReportArgs {
    /// Workflow whose final state should be summarized.
    #[arg(value_name = "WORKFLOW_ID")]
    pub workflow_id: Uuid,

    /// Emit either a terminal-friendly summary or machine-readable JSON.
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: ReportFormat,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

#[derive(Clone, Copy, clap::ValueEnum, Debug)]
pub enum ReportFormat {
    /// Human-readable per-task status/duration/error summary.
    Text,
    /// JSON document reusing the persisted `WorkflowState` verbatim.
    Json,
}
