//! Verify command - check an image against the configuration

use crate::cli::args::VerifyArgs;
use crate::config::Config;
use crate::context::BuildContext;
use crate::engine::{create_engine, ContainerEngine};
use crate::error::{BakeError, BakeResult};
use crate::ui::{self, TaskSpinner, UiContext};
use crate::verify::verify_image;

/// Execute the verify command
pub async fn execute(args: VerifyArgs, config: &Config) -> BakeResult<()> {
    let ctx = UiContext::detect();
    let root = super::context_root(&args.context)?;
    let build_ctx = BuildContext::open(&root, config).await?;
    let engine = create_engine(&config.engine).await?;

    ui::intro(&ctx, "pybake verify");
    report(&ctx, engine.as_ref(), &args.image, &build_ctx).await
}

/// Run and print all checks; fails when any check fails
pub(crate) async fn report(
    ctx: &UiContext,
    engine: &dyn ContainerEngine,
    image: &str,
    build_ctx: &BuildContext,
) -> BakeResult<()> {
    let mut spinner = TaskSpinner::new(ctx);
    spinner.start(&format!("Verifying {}...", image));
    let report = match verify_image(engine, image, &build_ctx.build, &build_ctx.manifest).await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Verification could not run");
            return Err(e);
        }
    };
    spinner.stop(&format!("Ran {} checks", report.checks.len()));

    for check in &report.checks {
        ui::check_line(ctx, &check.name, check.passed, &check.detail);
    }

    if report.passed() {
        ui::outro_success(ctx, &format!("{} runs unprivileged", image));
        Ok(())
    } else {
        ui::outro_error(ctx, &format!("{} failed verification", image));
        Err(BakeError::VerificationFailed {
            image: image.to_string(),
            failed: report.failures(),
        })
    }
}
