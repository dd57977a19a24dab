mod assistant;
mod classify;
mod commands;
mod debate;
mod llm;
mod memory;
mod progress;
mod prompts;
mod research;
mod retry;
mod search;
mod state;
#[cfg(test)]
mod testing;

use std::collections::HashSet;
use std::sync::Arc;

use poise::serenity_prelude as serenity;
use poise::{Framework, FrameworkOptions};
use tracing::{error, info, Level};

use assistant::Collaborators;
use llm::{ChatModel, LlmClient, Models};
use memory::MemoryStore;
use search::{DuckDuckGo, HttpPageSource};
use state::{AppState, AssistantConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    // Load env
    let _ = dotenv::dotenv();
    let token = dotenv::var("DISCORD_TOKEN")
        .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN required"))?;
    let guild_id: Option<serenity::GuildId> = dotenv::var("DISCORD_GUILD_ID")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(serenity::GuildId::new);

    // Init LLM client
    let models = Models::from_env();
    let llm_client: Arc<dyn ChatModel> = Arc::new(LlmClient::from_env()?);
    info!(fast = %models.fast, thorough = %models.thorough, "LLM client initialized");

    // Init memory storage
    let data_dir = std::path::PathBuf::from(
        dotenv::var("AGORA_DATA_DIR").unwrap_or_else(|_| "./data/memory".to_string()),
    );
    let memory = Arc::new(MemoryStore::new(&data_dir, llm_client.clone(), &models.fast).await?);
    info!("Memory store initialized at {:?}", data_dir);

    let collaborators = Collaborators {
        model: llm_client,
        search: Arc::new(DuckDuckGo::new()?),
        pages: Arc::new(HttpPageSource::new()?),
        memory: memory.clone(),
    };

    // Parse admin user IDs from env
    let admin_ids: HashSet<u64> = dotenv::var("ADMIN_USER_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect();
    if !admin_ids.is_empty() {
        info!(count = admin_ids.len(), "Admin users configured");
    }

    let app_state = AppState::new(
        collaborators,
        memory,
        models,
        admin_ids,
        AssistantConfig::default(),
    );

    let intents =
        serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MESSAGES;

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![commands::agora()],
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot connected as: {} ({})", ready.user.name, ready.user.id);

                let commands = &framework.options().commands;
                for cmd in commands {
                    let subs: Vec<&str> = cmd.subcommands.iter().map(|s| s.name.as_str()).collect();
                    info!(command = %cmd.name, subcommands = %subs.join(", "), "registering");
                }

                if let Some(gid) = guild_id {
                    info!("Registering to guild {} (instant)", gid);
                    poise::builtins::register_in_guild(ctx, commands, gid).await?;
                } else {
                    info!("Registering globally (up to 1 hour delay)");
                    poise::builtins::register_globally(ctx, commands).await?;
                }

                Ok(app_state)
            })
        })
        .build();

    info!("Starting Agora Discord bot...");

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    if let Err(e) = client.start().await {
        error!("Client error: {}", e);
    }

    Ok(())
}
