//! CLI command implementations

pub mod build;
pub mod completions;
pub mod config;
pub mod init;
pub mod plan;
pub mod prune;
pub mod render;
pub mod verify;

pub use build::execute as build;
pub use completions::execute as completions;
pub use config::execute as config;
pub use init::execute as init;
pub use plan::execute as plan;
pub use prune::execute as prune;
pub use render::execute as render;
pub use verify::execute as verify;

use crate::cli::args::ContextArgs;
use crate::error::{BakeError, BakeResult};
use std::path::PathBuf;

/// Build context directory from `--context`, or the current directory
pub(crate) fn context_root(args: &ContextArgs) -> BakeResult<PathBuf> {
    match args.context {
        Some(ref dir) => Ok(dir.clone()),
        None => std::env::current_dir().map_err(|e| BakeError::io("getting current directory", e)),
    }
}
