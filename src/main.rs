//! pybake - container images for Python web applications
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use pybake::cli::{commands, Cli, Commands};
use pybake::config::ConfigManager;
use pybake::error::{BakeError, BakeResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> BakeResult<()> {
    let cli = Cli::parse();

    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("pybake=warn"),
        1 => EnvFilter::new("pybake=info"),
        _ => EnvFilter::new("pybake=debug"),
    };

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }

    pybake::ui::init_theme();

    // Commands that need no configuration
    match cli.command {
        Commands::Init(args) => return commands::init(args).await,
        Commands::Completions(args) => return commands::completions(args),
        _ => {}
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let local_config_path = if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
        None
    } else {
        let start = match cli.command.context_dir() {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()
                .map_err(|e| BakeError::io("getting current directory", e))?,
        };
        let found = ConfigManager::find_local_config(&start);
        if let Some(ref path) = found {
            debug!("Found local config: {}", path.display());
        }
        found
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    ConfigManager::ensure_state_dirs().await?;

    match cli.command {
        Commands::Plan(args) => commands::plan(args, &config).await,
        Commands::Render(args) => commands::render(args, &config).await,
        Commands::Build(args) => commands::build(args, &config).await,
        Commands::Verify(args) => commands::verify(args, &config).await,
        Commands::Prune(args) => commands::prune(args, &config).await,
        Commands::Config(args) => {
            commands::config(args, &config, &config_manager, local_config_path.as_deref()).await
        }
        Commands::Init(_) | Commands::Completions(_) => unreachable!("handled before config load"),
    }
}
