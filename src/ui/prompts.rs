//! Confirmation prompt with a non-interactive fallback

use super::context::UiContext;
use crate::error::{ShelfError, ShelfResult};

/// Ask for confirmation
///
/// `--yes` answers yes; a non-interactive run answers `default`.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> ShelfResult<bool> {
    if ctx.auto_yes() {
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
    .map_err(|e| ShelfError::Internal(format!("prompt task failed: {}", e)))?
    .map_err(|e| ShelfError::User(format!("Prompt cancelled: {}", e)))
}
