//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// pybake - layer-cached, least-privilege images for Python web apps
///
/// Generates a Dockerfile from pybake.toml and requirements.txt, builds it
/// with Podman or Docker and verifies the result runs unprivileged.
#[derive(Parser, Debug)]
#[command(name = "pybake")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PYBAKE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip project-local pybake.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a commented pybake.toml into a project
    Init(InitArgs),

    /// Show build steps and which layers will come from cache
    Plan(ContextArgs),

    /// Print or write the generated Dockerfile
    Render(RenderArgs),

    /// Build the application image
    Build(BuildArgs),

    /// Check that an image runs unprivileged and matches the configuration
    Verify(VerifyArgs),

    /// Remove images built by pybake
    Prune(PruneArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Commands {
    /// Build context directory the command operates on, if any
    pub fn context_dir(&self) -> Option<&PathBuf> {
        match self {
            Self::Plan(args) => args.context.as_ref(),
            Self::Render(args) => args.context.context.as_ref(),
            Self::Build(args) => args.context.context.as_ref(),
            Self::Verify(args) => args.context.context.as_ref(),
            _ => None,
        }
    }
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite an existing pybake.toml
    #[arg(short, long)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,
}

/// Build context selection shared by several commands
#[derive(Parser, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Build context directory (defaults to current directory)
    #[arg(short = 'C', long)]
    pub context: Option<PathBuf>,
}

/// Arguments for the render command
#[derive(Parser, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// Write the Dockerfile here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// Additional tags (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Rebuild every layer
    #[arg(long)]
    pub no_cache: bool,

    /// Always pull the base image
    #[arg(long)]
    pub pull: bool,

    /// Verify the image after building
    #[arg(long)]
    pub verify: bool,
}

/// Arguments for the verify command
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Image to verify
    pub image: String,

    #[command(flatten)]
    pub context: ContextArgs,
}

/// Arguments for the prune command
#[derive(Parser, Debug)]
pub struct PruneArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show what would be removed
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default global configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., image.base)
        key: String,
        /// Value to set
        value: String,
        /// Write to the project-local pybake.toml instead of global config
        #[arg(long)]
        local: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
