//! Confirmation prompts

use super::context::UiContext;
use crate::error::{BakeError, BakeResult};

/// Ask a yes/no question.
///
/// `--yes` answers true; without a terminal the default is returned.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> BakeResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| BakeError::User(format!("Prompt task failed: {}", e)))?
    .map_err(|e| BakeError::User(format!("Prompt failed: {}", e)))
}
