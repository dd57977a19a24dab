//! Yes/no questions put to the fast model. Both classifiers read the answer
//! loosely: any reply containing "true" (any case) is a yes, and a failed
//! call is a no.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::{ChatModel, ChatRequest, Conversation, Message};
use crate::progress::with_indicator;
use crate::prompts;

fn affirmative(answer: &str) -> bool {
    answer.to_lowercase().contains("true")
}

pub struct Classifier {
    model: Arc<dyn ChatModel>,
    model_id: String,
    min_opinion_words: usize,
}

impl Classifier {
    pub fn new(model: Arc<dyn ChatModel>, fast_model: &str, min_opinion_words: usize) -> Self {
        Self {
            model,
            model_id: fast_model.to_string(),
            min_opinion_words,
        }
    }

    async fn ask(&self, label: &str, instruction: &str, message: Message) -> bool {
        let request = ChatRequest::new(
            &self.model_id,
            vec![Message::system(instruction), message],
        );
        match with_indicator(label, self.model.complete(request)).await {
            Ok(answer) => {
                let verdict = affirmative(&answer);
                debug!(label, answer = %answer.trim(), verdict, "classified");
                verdict
            }
            Err(e) => {
                warn!(label, error = %e, "classifier failed");
                false
            }
        }
    }

    /// Would a web search help answer `message`?
    pub async fn should_search(&self, message: &Message) -> bool {
        self.ask("Checking if search needed", prompts::SHOULD_SEARCH, message.clone())
            .await
    }

    /// Does the last turn take a side on a contested question? Short replies
    /// never do.
    pub async fn is_opinion(&self, conversation: &Conversation) -> bool {
        let last = conversation.last_content();
        if last.split_whitespace().count() < self.min_opinion_words {
            return false;
        }
        self.ask("Checking for opinions", prompts::OPINION_CHECK, Message::user(last))
            .await
    }
}
