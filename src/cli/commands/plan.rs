//! Plan command - show steps and expected cache reuse

use crate::cache::LayerStatus;
use crate::cli::args::ContextArgs;
use crate::config::Config;
use crate::context::BuildContext;
use crate::error::BakeResult;
use crate::history::BuildHistory;
use crate::ui::{self, UiContext};

/// Execute the plan command
pub async fn execute(args: ContextArgs, config: &Config) -> BakeResult<()> {
    let ctx = UiContext::detect();
    let root = super::context_root(&args)?;
    let build_ctx = BuildContext::open(&root, config).await?;

    let previous = BuildHistory::new(config).last_build(&build_ctx.root).await;
    let statuses = build_ctx.layers.compare(
        previous
            .as_ref()
            .map(|r| r.layers.as_slice())
            .unwrap_or_default(),
    );

    ui::intro(&ctx, "pybake plan");
    ui::key_value(&ctx, "Context", &build_ctx.root.display().to_string());
    ui::key_value(&ctx, "Base image", &build_ctx.build.base_image);
    ui::key_value(
        &ctx,
        "Manifest",
        &format!(
            "{} ({} requirements)",
            build_ctx.build.manifest_path,
            build_ctx.manifest.requirements.len()
        ),
    );
    ui::key_value(
        &ctx,
        "Source",
        &format!("{} ({} files)", build_ctx.build.source_path, build_ctx.source.files),
    );
    ui::key_value(
        &ctx,
        "DB client headers",
        if build_ctx.build.variant.include_db_client_headers {
            "yes"
        } else {
            "no"
        },
    );
    ui::key_value(&ctx, "Runtime user", &build_ctx.build.user.name);
    ui::key_value(&ctx, "Image", &build_ctx.image_tag());

    ui::section(&ctx, "Steps");
    let steps = build_ctx.recipe.steps();
    for (idx, ((step, layer), status)) in steps
        .iter()
        .zip(build_ctx.layers.layers())
        .zip(&statuses)
        .enumerate()
    {
        let label = format!("{}  {}", step.label(), &layer.key[..12]);
        ui::layer_line(&ctx, idx, *status, &label);
    }

    let reused = statuses
        .iter()
        .filter(|s| **s == LayerStatus::Reused)
        .count();
    match previous {
        Some(record) => ui::outro_success(
            &ctx,
            &format!(
                "{} of {} layers cached since {}",
                reused,
                statuses.len(),
                record.image
            ),
        ),
        None => ui::outro_warn(&ctx, "No previous build recorded; every layer will be built"),
    }

    Ok(())
}
