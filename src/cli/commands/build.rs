//! Build command - build the application image

use crate::builder::{self, BuildOptions};
use crate::cache::LayerStatus;
use crate::cli::args::BuildArgs;
use crate::config::{Config, ConfigManager};
use crate::context::BuildContext;
use crate::engine::create_engine;
use crate::error::BakeResult;
use crate::history::BuildHistory;
use crate::ui::{self, BuildProgress, TaskSpinner, UiContext};

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> BakeResult<()> {
    let ctx = UiContext::detect();
    let root = super::context_root(&args.context)?;

    ui::intro(&ctx, "pybake build");

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Planning build...");
    let build_ctx = match BuildContext::open(&root, config).await {
        Ok(build_ctx) => build_ctx,
        Err(e) => {
            spinner.stop_error("Planning failed");
            return Err(e);
        }
    };
    spinner.stop(&format!(
        "Planned {} steps from {} requirements and {} source files",
        build_ctx.recipe.steps().len(),
        build_ctx.manifest.requirements.len(),
        build_ctx.source.files
    ));

    let engine = create_engine(&config.engine).await?;
    ui::step_info(&ctx, &format!("Using {}", engine.engine_name()));

    let options = BuildOptions {
        tags: args.tags,
        no_cache: args.no_cache,
        pull: args.pull,
    };
    let history = BuildHistory::new(config);

    let progress = BuildProgress::new(&ctx, &build_ctx.image_tag());
    let result = builder::build_image(
        engine.as_ref(),
        &build_ctx,
        &options,
        &history,
        &ConfigManager::builds_dir(),
        &|line| progress.on_line(line),
    )
    .await;
    progress.finish();
    let outcome = result?;

    if outcome.was_cached {
        ui::step_ok_detail(&ctx, "Image up to date", &outcome.image_tag);
    } else {
        let reused = outcome
            .statuses
            .iter()
            .filter(|s| **s == LayerStatus::Reused)
            .count();
        ui::step_ok_detail(
            &ctx,
            &format!("Built {}", outcome.image_tag),
            &format!("{} of {} layers expected from cache", reused, outcome.statuses.len()),
        );
    }
    for tag in &options.tags {
        ui::step_ok(&ctx, &format!("Tagged {}", tag));
    }

    if args.verify {
        return super::verify::report(&ctx, engine.as_ref(), &outcome.image_tag, &build_ctx).await;
    }

    ui::outro_success(&ctx, &outcome.image_tag);
    Ok(())
}
