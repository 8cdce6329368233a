use clap::Parser;
use pipeline_orchestrator::cli::{self, Args};
use pipeline_orchestrator::core::find_workspace_root;
use pipeline_orchestrator::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let cwd = std::env::current_dir()?;
    let discovered = find_workspace_root(&cwd);
    let workspace_root = discovered.join("pipeline.toml").exists().then_some(discovered);

    let _guard = logging::init(workspace_root.as_deref())?;

    let exit_code = match cli::run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    };

    std::process::exit(exit_code);
}
