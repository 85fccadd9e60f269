//! Prune command - remove images built by pybake

use crate::cache::IMAGE_TAG_PREFIX;
use crate::cli::args::PruneArgs;
use crate::config::Config;
use crate::engine::create_engine;
use crate::error::BakeResult;
use crate::ui::{self, UiContext};
use tracing::warn;

/// Execute the prune command
pub async fn execute(args: PruneArgs, config: &Config) -> BakeResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let engine = create_engine(&config.engine).await?;

    ui::intro(&ctx, "pybake prune");

    let images = engine.image_list_prefixed(IMAGE_TAG_PREFIX).await?;
    if images.is_empty() {
        ui::outro_success(&ctx, "No pybake images to remove");
        return Ok(());
    }

    for image in &images {
        ui::key_value(&ctx, "Image", image);
    }

    if args.dry_run {
        ui::outro_warn(&ctx, &format!("Would remove {} image(s)", images.len()));
        return Ok(());
    }

    let prompt = format!("Remove {} image(s)?", images.len());
    if !ui::confirm(&ctx, &prompt, false).await? {
        ui::outro_warn(&ctx, "Nothing removed");
        return Ok(());
    }

    let mut removed = 0;
    for image in &images {
        match engine.image_remove(image).await {
            Ok(()) => {
                removed += 1;
                ui::step_ok(&ctx, &format!("Removed {}", image));
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", image, e);
                ui::step_warn(&ctx, &format!("Could not remove {} (in use?)", image));
            }
        }
    }

    ui::outro_success(&ctx, &format!("Removed {} of {} image(s)", removed, images.len()));
    Ok(())
}
