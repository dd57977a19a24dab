use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::llm::{collect_text, ChatModel, ChatRequest, Conversation, Message, Models};
use crate::memory::types::DebateTranscript;
use crate::progress::with_indicator;
use crate::prompts;
use crate::research::ResearchResolver;
use crate::state::AssistantConfig;

const SUPPORT_PURPOSE: &str = "research needed to support arguments about this topic";
const COUNTER_PURPOSE: &str = "research needed to counter these arguments";

/// Stored topics are cut to this many characters.
const TOPIC_EXCERPT_CHARS: usize = 200;

const NAME_PREFIXES: &[&str] = &[
    "Logic", "Reason", "Wisdom", "Truth", "Think", "Mind", "Brain", "Intel", "Smart", "Sage",
    "Know", "Bright",
];
const NAME_SUFFIXES: &[&str] = &[
    "Master", "Seeker", "Finder", "Walker", "Weaver", "Smith", "Knight", "Sage", "Scholar",
    "Expert", "Guide", "Oracle",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Proponent,
    Opponent,
    Analysis,
    Summary,
}

impl Stage {
    fn instruction(self) -> &'static str {
        match self {
            Stage::Proponent => prompts::PROPONENT,
            Stage::Opponent => prompts::OPPONENT,
            Stage::Analysis => prompts::ANALYZER,
            Stage::Summary => prompts::SUMMARIZER,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Proponent => "First Agent",
            Stage::Opponent => "Second Agent",
            Stage::Analysis => "Third Party Analysis",
            Stage::Summary => "Quick Summary",
        }
    }

    /// State entered once this stage's text is appended.
    fn next(self) -> DebateState {
        match self {
            Stage::Proponent => DebateState::Opponent,
            Stage::Opponent => DebateState::Analysis,
            Stage::Analysis => DebateState::Summary,
            Stage::Summary => DebateState::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebateState {
    Idle,
    Proponent,
    Opponent,
    Analysis,
    Summary,
    Done,
    Aborted,
}

impl DebateState {
    /// The stage to run in this state, if any.
    fn stage(self) -> Option<Stage> {
        match self {
            DebateState::Proponent => Some(Stage::Proponent),
            DebateState::Opponent => Some(Stage::Opponent),
            DebateState::Analysis => Some(Stage::Analysis),
            DebateState::Summary => Some(Stage::Summary),
            DebateState::Idle | DebateState::Done | DebateState::Aborted => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: Stage,
    pub speaker: String,
    pub text: String,
}

/// Successful stages in stage order. A stage can only follow its predecessor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebateRecord {
    entries: Vec<StageEntry>,
}

impl DebateRecord {
    const ORDER: [Stage; 4] = [Stage::Proponent, Stage::Opponent, Stage::Analysis, Stage::Summary];

    fn push(&mut self, entry: StageEntry) {
        debug_assert_eq!(Self::ORDER.get(self.entries.len()), Some(&entry.stage));
        self.entries.push(entry);
    }

    pub fn text(&self, stage: Stage) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.stage == stage)
            .map(|e| e.text.as_str())
    }

    pub fn entries(&self) -> &[StageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebateOutcome {
    pub topic: String,
    pub fast_mode: bool,
    /// `Done` or `Aborted`.
    pub state: DebateState,
    pub record: DebateRecord,
    pub failed_stage: Option<Stage>,
    /// True when the entry guard turned the debate down.
    pub skipped: bool,
}

impl DebateOutcome {
    fn skipped(topic: String, fast_mode: bool) -> Self {
        Self {
            topic,
            fast_mode,
            state: DebateState::Done,
            record: DebateRecord::default(),
            failed_stage: None,
            skipped: true,
        }
    }

    /// Persistable form of a debate that actually ran.
    pub fn transcript(&self, recorded_at: DateTime<Utc>) -> Option<DebateTranscript> {
        if self.skipped {
            return None;
        }
        let seed = format!("{}\n{}", recorded_at.timestamp_millis(), self.topic);
        let id = blake3::hash(seed.as_bytes()).to_hex().to_string();
        Some(DebateTranscript {
            id,
            topic: self.topic.chars().take(TOPIC_EXCERPT_CHARS).collect(),
            state: self.state,
            fast_mode: self.fast_mode,
            stages: self.record.entries().to_vec(),
            recorded_at: recorded_at.timestamp(),
        })
    }
}

fn agent_name() -> String {
    let mut rng = rand::thread_rng();
    let prefix = NAME_PREFIXES.choose(&mut rng).copied().unwrap_or("Logic");
    let suffix = NAME_SUFFIXES.choose(&mut rng).copied().unwrap_or("Master");
    format!("{}{}", prefix, suffix)
}

fn speaker_for(stage: Stage) -> String {
    match stage {
        Stage::Proponent | Stage::Opponent => agent_name(),
        Stage::Analysis => "Analyst".to_string(),
        Stage::Summary => "Summary".to_string(),
    }
}

fn proponent_prompt(topic: &str, research: &str) -> String {
    let framing = format!(
        "DEBATE TOPIC: The implications and impacts of these current events:\n{}\n\n\
        Consider:\n\
        - The societal implications\n\
        - The policy implications\n\
        - The potential consequences\n\
        - Different stakeholder perspectives\n\
        You MUST take a position on how these events should be interpreted and what they mean for society.",
        topic
    );
    if research.is_empty() {
        framing
    } else {
        format!("{}\n\nRESEARCH CONTEXT:\n{}", framing, research)
    }
}

fn opponent_prompt(topic: &str, argument: &str, research: &str) -> String {
    let mut prompt = format!(
        "FIRST POSITION ON THE IMPLICATIONS OF:\n{}\n\nTHEIR ARGUMENT:\n{}\n\n",
        topic, argument
    );
    if !research.is_empty() {
        prompt.push_str(&format!("RESEARCH CONTEXT:\n{}\n\n", research));
    }
    prompt.push_str(
        "Present a counter-argument about the implications and impacts. \
        You MUST take the opposite position on how these events should be interpreted.",
    );
    prompt
}

fn analysis_prompt(topic: &str, first: &str, second: &str) -> String {
    format!(
        "TOPIC: {}\n\nFIRST POSITION:\n{}\n\nSECOND POSITION:\n{}\n\nAnalyze these opposing viewpoints.",
        topic, first, second
    )
}

/// Runs the four-stage debate over an opinion-bearing reply.
pub struct DebateOrchestrator {
    model: Arc<dyn ChatModel>,
    research: Arc<ResearchResolver>,
    models: Models,
    min_words: usize,
    research_limit: usize,
}

impl DebateOrchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        research: Arc<ResearchResolver>,
        models: Models,
        config: &AssistantConfig,
    ) -> Self {
        Self {
            model,
            research,
            models,
            min_words: config.min_debate_words,
            research_limit: config.debate_context_chars,
        }
    }

    /// Debate the conversation's last message. Each successful stage is
    /// appended as an assistant turn; the first failed stage ends the debate
    /// and leaves earlier turns in place.
    pub async fn run(&self, conversation: &mut Conversation, fast_mode: bool) -> DebateOutcome {
        let topic = conversation.last_content().to_string();
        let words = topic.split_whitespace().count();
        if words < self.min_words {
            debug!(words, min = self.min_words, "too short to debate");
            return DebateOutcome::skipped(topic, fast_mode);
        }

        let model_id = self.models.select(fast_mode).to_string();
        info!(model = %model_id, words, "starting debate");

        let topic_view = Conversation::from(vec![Message::user(topic.clone())]);
        let mut record = DebateRecord::default();
        let mut failed_stage = None;
        let mut state = DebateState::Proponent;

        while let Some(stage) = state.stage() {
            let prompt = match stage {
                Stage::Proponent => {
                    let research = self
                        .research
                        .resolve(&topic_view, SUPPORT_PURPOSE, self.research_limit)
                        .await;
                    proponent_prompt(&topic, research.context())
                }
                Stage::Opponent => {
                    let research = self
                        .research
                        .resolve(&topic_view, COUNTER_PURPOSE, self.research_limit)
                        .await;
                    let argument = record.text(Stage::Proponent).unwrap_or_default();
                    opponent_prompt(&topic, argument, research.context())
                }
                Stage::Analysis => analysis_prompt(
                    &topic,
                    record.text(Stage::Proponent).unwrap_or_default(),
                    record.text(Stage::Opponent).unwrap_or_default(),
                ),
                Stage::Summary => record.text(Stage::Analysis).unwrap_or_default().to_string(),
            };

            let model = match stage {
                Stage::Summary => self.models.fast.as_str(),
                _ => model_id.as_str(),
            };

            match self.speak(stage, model, prompt).await {
                Some(text) => {
                    conversation.push(Message::assistant(text.clone()));
                    record.push(StageEntry {
                        stage,
                        speaker: speaker_for(stage),
                        text,
                    });
                    state = stage.next();
                }
                None => {
                    failed_stage = Some(stage);
                    state = DebateState::Aborted;
                }
            }
        }

        info!(state = ?state, stages = record.len(), "debate finished");
        DebateOutcome {
            topic,
            fast_mode,
            state,
            record,
            failed_stage,
            skipped: false,
        }
    }

    /// One stage's model call. Errors and blank replies are both `None`.
    async fn speak(&self, stage: Stage, model: &str, prompt: String) -> Option<String> {
        let request = ChatRequest::instructed(model, stage.instruction(), prompt).streaming();
        let reply = with_indicator(stage.label(), async {
            let response = self.model.chat(request).await?;
            collect_text(response).await
        })
        .await;

        match reply {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!(stage = stage.label(), "stage returned nothing");
                None
            }
            Err(e) => {
                warn!(stage = stage.label(), error = %e, "stage failed");
                None
            }
        }
    }
}
