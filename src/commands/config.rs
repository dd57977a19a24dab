use crate::state::{AssistantConfig, Context};

/// Configure assistant parameters (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn config(
    ctx: Context<'_>,
    #[description = "min_debate_words | selection_attempts | validation_timeout_secs | ..."]
    param: Option<String>,
    #[description = "New value (memory_enabled takes 0 or 1)"] value: Option<u32>,
) -> Result<(), anyhow::Error> {
    let user_id = ctx.author().id.get();
    if !ctx.data().is_admin(user_id) {
        ctx.say("This command is admin-only.").await?;
        return Ok(());
    }

    match (param.as_deref(), value) {
        // Show current config
        (None, _) => {
            let config = ctx.data().config.read().await;
            ctx.say(format!("**Assistant Configuration:**\n{}", config.describe()))
                .await?;
        }
        // Set a parameter
        (Some(key), Some(val)) => {
            let result = ctx.data().config.write().await.set(key, val);
            match result {
                Ok(()) => ctx.say(format!("`{}` set to {}", key, val)).await?,
                Err(e) => ctx.say(e.to_string()).await?,
            };
        }
        (Some(key), None) if !AssistantConfig::PARAMS.contains(&key) => {
            ctx.say(format!("Unknown param `{}`.", key)).await?;
        }
        (Some(_), None) => {
            ctx.say("Provide both `param` and `value`. Example: `/agora config min_debate_words 50`")
                .await?;
        }
    }

    Ok(())
}
