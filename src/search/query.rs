use std::sync::Arc;

use tracing::info;

use crate::llm::{ChatModel, ChatRequest, Conversation};
use crate::prompts;
use crate::retry::{invoke_with_fallback, RetryPolicy};

const FALLBACK_QUERY: &str = "latest news";
const MAX_QUERY_WORDS: usize = 8;

const TIME_QUALIFIERS: &[&str] = &[
    "latest",
    "recent",
    "current",
    "last 24 hours",
    "last week",
    "this month",
];

pub struct QueryComposer {
    model: Arc<dyn ChatModel>,
    model_id: String,
}

impl QueryComposer {
    pub fn new(model: Arc<dyn ChatModel>, model_id: &str) -> Self {
        Self {
            model,
            model_id: model_id.to_string(),
        }
    }

    /// Turn the conversation's last message into a short, time-qualified
    /// search query. Never fails and never returns an empty string.
    pub async fn compose(&self, conversation: &Conversation) -> String {
        let request = ChatRequest::instructed(
            &self.model_id,
            prompts::QUERY_COMPOSER,
            format!(
                "Write a search query for this message. Be specific about the topic and the time \
                frame; for general news name the main areas (politics, world events, technology, \
                and so on):\n{}",
                conversation.last_content()
            ),
        );

        let raw = invoke_with_fallback(
            "compose query",
            RetryPolicy::once(),
            FALLBACK_QUERY.to_string(),
            || self.model.complete(request.clone()),
            |text| Some(text.to_string()),
        )
        .await;

        let query = clean_query(&raw);
        info!(query = %query, "search query composed");
        query
    }
}

fn is_numeric_token(word: &str) -> bool {
    let is_year = word.len() == 4 && word.starts_with("20");
    let all_digits = !word.is_empty() && word.chars().all(|c| c.is_ascii_digit());
    all_digits || is_year
}

/// Deterministic cleanup of whatever the model produced.
pub fn clean_query(raw: &str) -> String {
    let first_line = raw.lines().next().unwrap_or("");
    let unquoted: String = first_line
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`'))
        .collect();

    let mut words: Vec<String> = unquoted
        .split_whitespace()
        .filter(|w| !is_numeric_token(w))
        .map(str::to_string)
        .collect();

    words.truncate(MAX_QUERY_WORDS);
    let joined = words.join(" ").to_lowercase();
    if !TIME_QUALIFIERS.iter().any(|q| joined.contains(q)) {
        words.insert(0, "latest".to_string());
        words.truncate(MAX_QUERY_WORDS);
    }

    words.join(" ")
}
