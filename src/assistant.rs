use std::sync::Arc;

use tracing::{info, warn};

use crate::classify::Classifier;
use crate::debate::{DebateOrchestrator, DebateOutcome};
use crate::llm::{collect_text, ChatModel, ChatRequest, Conversation, Message, Models};
use crate::memory::UserMemory;
use crate::progress::with_indicator;
use crate::prompts;
use crate::research::{ResearchOutcome, ResearchResolver};
use crate::search::{PageSource, SearchBackend};
use crate::state::AssistantConfig;

const FAST_SUFFIX: &str = "-fast";

/// Split a trailing `-fast` off the input. Returns the prompt and whether
/// the fast model was requested.
pub fn split_fast_suffix(input: &str) -> (String, bool) {
    let trimmed = input.trim();
    match trimmed.strip_suffix(FAST_SUFFIX) {
        Some(rest) => (rest.trim().to_string(), true),
        None => (trimmed.to_string(), false),
    }
}

/// External services a turn talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn ChatModel>,
    pub search: Arc<dyn SearchBackend>,
    pub pages: Arc<dyn PageSource>,
    pub memory: Arc<dyn UserMemory>,
}

#[derive(Debug)]
pub struct TurnReport {
    pub prompt: String,
    pub fast_mode: bool,
    /// `None` when the model failed to answer.
    pub reply: Option<String>,
    /// `None` when no search was attempted.
    pub research: Option<ResearchOutcome>,
    /// `None` when the reply was not opinion-bearing.
    pub debate: Option<DebateOutcome>,
}

pub struct Assistant {
    model: Arc<dyn ChatModel>,
    models: Models,
    memory: Arc<dyn UserMemory>,
    memory_enabled: bool,
    classifier: Classifier,
    research: Arc<ResearchResolver>,
    debate: DebateOrchestrator,
    context_limit: usize,
}

impl Assistant {
    pub fn new(collaborators: &Collaborators, models: &Models, config: &AssistantConfig) -> Self {
        let model = collaborators.model.clone();
        let research = Arc::new(ResearchResolver::new(
            model.clone(),
            &models.fast,
            collaborators.search.clone(),
            collaborators.pages.clone(),
            config,
        ));
        Self {
            classifier: Classifier::new(model.clone(), &models.fast, config.min_debate_words),
            debate: DebateOrchestrator::new(model.clone(), research.clone(), models.clone(), config),
            research,
            model,
            models: models.clone(),
            memory: collaborators.memory.clone(),
            memory_enabled: config.memory_enabled,
            context_limit: config.assistant_context_chars,
        }
    }

    async fn user_turn(&self, prompt: &str) -> String {
        if !self.memory_enabled {
            return prompt.to_string();
        }
        self.memory.record_message(prompt).await;

        match self.memory.current_snapshot().await.relevant_context() {
            Some(context) => {
                let pretty =
                    serde_json::to_string_pretty(&context).unwrap_or_else(|_| context.to_string());
                format!("USER MEMORY CONTEXT:\n{}\n\nUSER PROMPT: {}", pretty, prompt)
            }
            None => prompt.to_string(),
        }
    }

    /// Run one user turn: remember, maybe research, reply, maybe debate.
    /// Every step degrades instead of failing; a missing reply ends the turn
    /// with the user message as the conversation's last entry.
    pub async fn process_input(&self, conversation: &mut Conversation, input: &str) -> TurnReport {
        let (prompt, fast_mode) = split_fast_suffix(input);
        if fast_mode {
            info!("fast mode enabled");
        }

        let turn = self.user_turn(&prompt).await;
        conversation.push(Message::user(turn));

        let mut research = None;
        let wants_search = match conversation.last() {
            Some(message) => self.classifier.should_search(message).await,
            None => false,
        };
        if wants_search {
            let outcome = self
                .research
                .resolve(conversation, "answer the user's message", self.context_limit)
                .await;
            conversation.pop();
            let turn = match &outcome {
                ResearchOutcome::Found(context) => {
                    format!("SEARCH RESULT: {} \n\nUSER PROMPT: {}", context, prompt)
                }
                ResearchOutcome::NotFound(_) => prompts::failed_search(&prompt),
            };
            conversation.push(Message::user(turn));
            research = Some(outcome);
        }

        let request =
            ChatRequest::new(self.models.select(fast_mode), conversation.messages().to_vec())
                .streaming();
        let reply = with_indicator("Processing response", async {
            let response = self.model.chat(request).await?;
            collect_text(response).await
        })
        .await;

        let reply = match reply {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "no reply from model");
                return TurnReport {
                    prompt,
                    fast_mode,
                    reply: None,
                    research,
                    debate: None,
                };
            }
        };
        conversation.push(Message::assistant(reply.clone()));

        let debate = if self.classifier.is_opinion(conversation).await {
            Some(self.debate.run(conversation, fast_mode).await)
        } else {
            None
        };

        TurnReport {
            prompt,
            fast_mode,
            reply: Some(reply),
            research,
            debate,
        }
    }
}
