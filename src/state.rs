use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::{Mutex, RwLock};

use crate::assistant::Collaborators;
use crate::llm::{Conversation, Models};
use crate::memory::MemoryStore;
use crate::prompts;

/// Pipeline tunables (admins can modify at runtime). Each turn works on a
/// copy taken when the turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantConfig {
    pub min_debate_words: usize,
    pub assistant_context_chars: usize,
    pub debate_context_chars: usize,
    pub selection_attempts: u32,
    pub validation_timeout_secs: u64,
    pub fetch_delay_ms: u64,
    pub memory_enabled: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            min_debate_words: 30,
            assistant_context_chars: 5000,
            debate_context_chars: 2000,
            selection_attempts: 2,
            validation_timeout_secs: 15,
            fetch_delay_ms: 1000,
            memory_enabled: true,
        }
    }
}

impl AssistantConfig {
    pub const PARAMS: &'static [&'static str] = &[
        "min_debate_words",
        "assistant_context_chars",
        "debate_context_chars",
        "selection_attempts",
        "validation_timeout_secs",
        "fetch_delay_ms",
        "memory_enabled",
    ];

    /// Set one parameter by name. `memory_enabled` takes 0 or 1.
    pub fn set(&mut self, param: &str, value: u32) -> Result<()> {
        match param {
            "min_debate_words" => self.min_debate_words = value as usize,
            "assistant_context_chars" => self.assistant_context_chars = value as usize,
            "debate_context_chars" => self.debate_context_chars = value as usize,
            "selection_attempts" => {
                if value == 0 {
                    bail!("`selection_attempts` must be at least 1");
                }
                self.selection_attempts = value;
            }
            "validation_timeout_secs" => {
                if value == 0 {
                    bail!("`validation_timeout_secs` must be at least 1");
                }
                self.validation_timeout_secs = value as u64;
            }
            "fetch_delay_ms" => self.fetch_delay_ms = value as u64,
            "memory_enabled" => match value {
                0 => self.memory_enabled = false,
                1 => self.memory_enabled = true,
                _ => bail!("`memory_enabled` takes 0 or 1"),
            },
            _ => bail!(
                "Unknown param `{}`. Valid: {}",
                param,
                Self::PARAMS
                    .iter()
                    .map(|p| format!("`{}`", p))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
        Ok(())
    }

    /// One `name`: value line per parameter, for Discord.
    pub fn describe(&self) -> String {
        let values = [
            self.min_debate_words.to_string(),
            self.assistant_context_chars.to_string(),
            self.debate_context_chars.to_string(),
            self.selection_attempts.to_string(),
            self.validation_timeout_secs.to_string(),
            self.fetch_delay_ms.to_string(),
            self.memory_enabled.to_string(),
        ];
        Self::PARAMS
            .iter()
            .zip(values.iter())
            .map(|(name, value)| format!("`{}`: {}", name, value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }
}

pub struct AppState {
    pub collaborators: Collaborators,
    pub memory: Arc<MemoryStore>,
    pub models: Models,
    pub admin_ids: HashSet<u64>,
    pub config: Arc<RwLock<AssistantConfig>>,
    /// One conversation per Discord channel, locked for a whole turn.
    conversations: Mutex<HashMap<u64, Arc<Mutex<Conversation>>>>,
}

impl AppState {
    pub fn new(
        collaborators: Collaborators,
        memory: Arc<MemoryStore>,
        models: Models,
        admin_ids: HashSet<u64>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            collaborators,
            memory,
            models,
            admin_ids,
            config: Arc::new(RwLock::new(config)),
            conversations: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub async fn conversation_for(&self, channel_id: u64) -> Arc<Mutex<Conversation>> {
        let mut conversations = self.conversations.lock().await;
        conversations
            .entry(channel_id)
            .or_insert_with(|| Arc::new(Mutex::new(Conversation::seeded(prompts::ASSISTANT))))
            .clone()
    }

    /// Start the channel over from the system message. Waits for any turn
    /// in flight on that channel.
    pub async fn reset_conversation(&self, channel_id: u64) {
        let conversation = self.conversation_for(channel_id).await;
        *conversation.lock().await = Conversation::seeded(prompts::ASSISTANT);
    }
}

pub type Context<'a> = poise::Context<'a, AppState, anyhow::Error>;
