//! Completions command - print a shell completion script

use crate::cli::args::{Cli, CompletionsArgs};
use crate::error::BakeResult;
use clap::CommandFactory;

pub fn execute(args: CompletionsArgs) -> BakeResult<()> {
    let mut command = Cli::command();
    clap_complete::generate(args.shell, &mut command, "pybake", &mut std::io::stdout());
    Ok(())
}
