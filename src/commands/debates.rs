use crate::commands::chat::send_chunked;
use crate::memory::types::DebateTranscript;
use crate::state::Context;

/// List recent debates
#[poise::command(slash_command, guild_only)]
pub async fn debates(
    ctx: Context<'_>,
    #[description = "Max debates to show"] limit: Option<u32>,
) -> Result<(), anyhow::Error> {
    let limit = limit.unwrap_or(5).clamp(1, 25) as usize;
    let debates = ctx.data().memory.list_debates(limit).await?;

    if debates.is_empty() {
        ctx.say("No debates yet. One starts when a reply takes a side on a contested topic.")
            .await?;
        return Ok(());
    }

    let mut output = String::from("**Recent Debates**\n");
    for debate in &debates {
        output.push_str(&summarize(debate));
    }
    send_chunked(&ctx, &output).await
}

fn summarize(debate: &DebateTranscript) -> String {
    let when = chrono::DateTime::from_timestamp(debate.recorded_at, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown time".to_string());
    let topic: String = debate.topic.chars().take(120).collect();
    let speakers: Vec<&str> = debate.stages.iter().map(|s| s.speaker.as_str()).collect();

    format!(
        "\n**{}** `{}` {:?}, {} stage(s){}\n> {}\n  Speakers: {}\n",
        when,
        &debate.id[..12.min(debate.id.len())],
        debate.state,
        debate.stages.len(),
        if debate.fast_mode { ", fast" } else { "" },
        topic.replace('\n', " "),
        if speakers.is_empty() {
            "none".to_string()
        } else {
            speakers.join(", ")
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::{DebateState, Stage, StageEntry};

    #[test]
    fn test_summarize_debate() {
        let debate = DebateTranscript {
            id: "0123456789abcdef".to_string(),
            topic: "Rent caps\nin the city".to_string(),
            state: DebateState::Aborted,
            fast_mode: true,
            stages: vec![StageEntry {
                stage: Stage::Proponent,
                speaker: "SageOracle".to_string(),
                text: "For.".to_string(),
            }],
            recorded_at: 0,
        };
        let text = summarize(&debate);
        assert!(text.contains("**1970-01-01 00:00** `0123456789ab` Aborted, 1 stage(s), fast"));
        assert!(text.contains("> Rent caps in the city"));
        assert!(text.contains("Speakers: SageOracle"));
    }
}
