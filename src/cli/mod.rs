//! CLI scaffolding: argument parsing, command definitions, and command dispatch logic.
pub mod args;
pub mod commands;
pub mod workflow_file;

use args::{CancelArgs, CleanupArgs, ListArgs, PauseArgs, ReportArgs, ResumeArgs, RunArgs, StatusArgs};
use clap::{Parser, Subcommand};

const HELP_TEMPLATE: &str = "\
{name}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "pipeline")]
#[command(version = crate::VERSION)]
#[command(about = "Dependency-aware, resumable workflow orchestration core")]
#[command(help_template = HELP_TEMPLATE)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Create and execute a workflow from a definition file",
        after_help = "Example:\n    pipeline run workflow.json"
    )]
    Run(RunArgs),
    #[command(
        about = "Resume a previously-started workflow",
        after_help = "Example:\n    pipeline resume 12345678-1234-1234-1234-123456789abc"
    )]
    Resume(ResumeArgs),
    #[command(
        about = "Print the current state of a workflow",
        after_help = "Example:\n    pipeline status 12345678-1234-1234-1234-123456789abc"
    )]
    Status(StatusArgs),
    #[command(
        about = "Request cancellation of a running workflow",
        after_help = "Example:\n    pipeline cancel 12345678-1234-1234-1234-123456789abc"
    )]
    Cancel(CancelArgs),
    #[command(
        about = "Request a running workflow to pause once in-flight tasks finish",
        after_help = "Example:\n    pipeline pause 12345678-1234-1234-1234-123456789abc"
    )]
    Pause(PauseArgs),
    #[command(about = "List known workflows", after_help = "Example:\n    pipeline list")]
    List(ListArgs),
    #[command(
        about = "Remove old workflow state and expired cache entries",
        after_help = "Example:\n    pipeline cleanup --older-than 7d"
    )]
    Cleanup(CleanupArgs),
    #[command(
        about = "Render a workflow's final state as text or JSON",
        after_help = "Example:\n    pipeline report 12345678-1234-1234-1234-123456789abc --format json"
    )]
    Report(ReportArgs),
}

/// Dispatch a parsed [`Args`] to its command implementation, returning the process exit code.
pub async fn run(args: Args) -> crate::Result<i32> {
    match args.command {
        Command::Run(run_args) => commands::run(run_args).await,
        Command::Resume(resume_args) => commands::resume(resume_args).await,
        Command::Status(status_args) => commands::status(status_args),
        Command::Cancel(cancel_args) => commands::cancel(cancel_args),
        Command::Pause(pause_args) => commands::pause(pause_args),
        Command::List(list_args) => commands::list(list_args),
        Command::Cleanup(cleanup_args) => commands::cleanup(cleanup_args),
        Command::Report(report_args) => commands::report(report_args),
    }
}
