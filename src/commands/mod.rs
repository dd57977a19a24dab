mod chat;
mod config;
mod debates;
mod manage;
mod memory;

use crate::state::Context;

/// Agora - research and debate assistant
#[poise::command(
    slash_command,
    subcommands(
        "chat::chat",
        "memory::memory",
        "memory::forget",
        "debates::debates",
        "manage::clear",
        "manage::thread",
        "config::config"
    )
)]
pub async fn agora(_ctx: Context<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}
