use tracing::{debug, info, warn};

use crate::assistant::{Assistant, TurnReport};
use crate::debate::DebateState;
use crate::research::ResearchOutcome;
use crate::state::Context;

/// Discord rejects messages over 2000 characters.
const CHUNK_CHARS: usize = 1990;

/// Talk to the assistant in this channel
#[poise::command(slash_command, guild_only)]
pub async fn chat(
    ctx: Context<'_>,
    #[description = "Your message"] message: String,
    #[description = "Use the fast model for this turn"] fast: Option<bool>,
) -> Result<(), anyhow::Error> {
    // Acknowledge immediately; a turn with research and a debate takes minutes
    let user_mention = format!("<@{}>", ctx.author().id);
    ctx.say(format!("Thinking it over, {}...", user_mention)).await?;

    let input = if fast.unwrap_or(false) {
        format!("{} -fast", message)
    } else {
        message
    };

    let config = ctx.data().config.read().await.clone();
    let assistant = Assistant::new(&ctx.data().collaborators, &ctx.data().models, &config);

    let channel_id = ctx.channel_id();
    let conversation = ctx.data().conversation_for(channel_id.get()).await;
    let _typing = channel_id.start_typing(&ctx.serenity_context().http);

    info!(user = ctx.author().name, channel = channel_id.get(), "turn started");
    let report = {
        let mut conversation = conversation.lock().await;
        let report = assistant.process_input(&mut conversation, &input).await;
        debug!(turns = conversation.messages().len(), "conversation updated");
        report
    };
    info!(
        prompt = %report.prompt,
        fast = report.fast_mode,
        replied = report.reply.is_some(),
        searched = report.research.is_some(),
        debated = report.debate.is_some(),
        "turn complete"
    );

    if let Some(transcript) = report
        .debate
        .as_ref()
        .and_then(|d| d.transcript(chrono::Utc::now()))
    {
        if let Err(e) = ctx.data().memory.store_debate(&transcript).await {
            warn!(error = %e, "failed to store debate");
        }
    }

    send_chunked(&ctx, &render(&user_mention, &report)).await
}

fn render(user_mention: &str, report: &TurnReport) -> String {
    let mut full = match &report.reply {
        Some(reply) => format!("{} {}", user_mention, reply.trim()),
        None => format!(
            "{} Sorry, the model didn't answer. Try again in a moment.",
            user_mention
        ),
    };

    if report.research.as_ref().is_some_and(ResearchOutcome::is_found) {
        full.push_str("\n\n_Answered with web search._");
    }

    if let Some(debate) = report.debate.as_ref().filter(|d| !d.record.is_empty()) {
        full.push_str("\n\n---\n**Debate**\n");
        for entry in debate.record.entries() {
            full.push_str(&format!(
                "\n**{}** ({})\n{}\n",
                entry.speaker,
                entry.stage.label(),
                entry.text.trim()
            ));
        }
        if debate.state == DebateState::Aborted {
            if let Some(stage) = debate.failed_stage {
                full.push_str(&format!("\n_Debate stopped at {}._", stage.label()));
            }
        }
    }

    full
}

/// Split `text` into pieces of at most `max` bytes, preferring line breaks,
/// then spaces. Never splits inside a character.
fn chunks(text: &str, max: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= max {
            out.push(remaining);
            break;
        }
        let mut end = max;
        while !remaining.is_char_boundary(end) {
            end -= 1;
        }
        let split_at = remaining[..end]
            .rfind('\n')
            .or_else(|| remaining[..end].rfind(' '))
            .map(|i| i + 1)
            .unwrap_or(end);
        out.push(&remaining[..split_at]);
        remaining = &remaining[split_at..];
    }
    out
}

/// Send a message in Discord-safe chunks. Every chunk goes through
/// `ctx.say()` so follow-ups use the interaction webhook.
pub(super) async fn send_chunked(ctx: &Context<'_>, text: &str) -> Result<(), anyhow::Error> {
    for chunk in chunks(text, CHUNK_CHARS) {
        ctx.say(chunk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::DebateOutcome;

    #[test]
    fn test_chunks_prefer_line_breaks() {
        let text = format!("{}\n{}", "a".repeat(10), "b".repeat(10));
        assert_eq!(chunks(&text, 15), vec![&text[..11], &text[11..]]);
    }

    #[test]
    fn test_chunks_respect_char_boundaries() {
        let text = "é".repeat(10);
        let parts = chunks(&text, 5);
        assert!(parts.iter().all(|p| p.len() <= 5));
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunks("hello", CHUNK_CHARS), vec!["hello"]);
        assert!(chunks("", CHUNK_CHARS).is_empty());
    }

    #[test]
    fn test_render_missing_reply() {
        let report = TurnReport {
            prompt: "hi".to_string(),
            fast_mode: false,
            reply: None,
            research: None,
            debate: None,
        };
        assert!(render("<@1>", &report).contains("didn't answer"));
    }

    #[test]
    fn test_render_hides_skipped_debate() {
        let report = TurnReport {
            prompt: "hi".to_string(),
            fast_mode: false,
            reply: Some("Hello.".to_string()),
            research: None,
            debate: Some(DebateOutcome {
                topic: "Hello.".to_string(),
                fast_mode: false,
                state: DebateState::Done,
                record: Default::default(),
                failed_stage: None,
                skipped: true,
            }),
        };
        assert_eq!(render("<@1>", &report), "<@1> Hello.");
    }
}
