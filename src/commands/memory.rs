use crate::memory::types::MemorySnapshot;
use crate::memory::UserMemory;
use crate::state::Context;

/// Show what the assistant remembers about you
#[poise::command(slash_command, guild_only)]
pub async fn memory(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let snapshot = ctx.data().memory.current_snapshot().await;
    ctx.say(describe(&snapshot)).await?;
    Ok(())
}

/// Forget everything the assistant remembers about you
#[poise::command(slash_command, guild_only)]
pub async fn forget(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    ctx.data().memory.forget().await?;
    ctx.say("Memory cleared.").await?;
    Ok(())
}

fn describe(snapshot: &MemorySnapshot) -> String {
    if snapshot.is_empty() {
        return "I don't remember anything about you yet.".to_string();
    }

    let mut out = String::from("**What I remember**\n");
    if !snapshot.personal_info.is_empty() {
        out.push_str("\n**About you**\n");
        for (key, value) in &snapshot.personal_info {
            out.push_str(&format!("- {}: {}\n", key, value));
        }
    }
    if !snapshot.interests.is_empty() {
        let interests: Vec<&str> = snapshot.interests.iter().map(|s| s.as_str()).collect();
        out.push_str(&format!("\n**Interests**\n{}\n", interests.join(", ")));
    }
    if !snapshot.preferences.is_empty() {
        out.push_str("\n**Preferences**\n");
        for (key, value) in &snapshot.preferences {
            out.push_str(&format!("- {}: {}\n", key, value));
        }
    }
    if let Some(at) = snapshot.last_updated {
        out.push_str(&format!("\n_Last updated {}_", at.format("%Y-%m-%d %H:%M UTC")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_sections() {
        assert!(describe(&MemorySnapshot::default()).contains("anything"));

        let mut snapshot = MemorySnapshot::default();
        snapshot.personal_info.insert("name".into(), "Ana".into());
        snapshot.interests.insert("chess".into());
        snapshot.interests.insert("hiking".into());
        let text = describe(&snapshot);
        assert!(text.contains("- name: Ana"));
        assert!(text.contains("chess, hiking"));
        assert!(!text.contains("Preferences"));
    }
}
