//! Render command - print or write the generated Dockerfile

use crate::cli::args::RenderArgs;
use crate::config::Config;
use crate::context::BuildContext;
use crate::error::{BakeError, BakeResult};
use crate::ui::{self, UiContext};

/// Execute the render command
pub async fn execute(args: RenderArgs, config: &Config) -> BakeResult<()> {
    let root = super::context_root(&args.context)?;
    let build_ctx = BuildContext::open(&root, config).await?;
    let dockerfile = build_ctx.recipe.render();

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &dockerfile)
                .await
                .map_err(|e| BakeError::io(format!("writing {}", path.display()), e))?;
            ui::step_ok_detail(
                &UiContext::detect(),
                "Wrote Dockerfile",
                &path.display().to_string(),
            );
        }
        None => print!("{}", dockerfile),
    }

    Ok(())
}
