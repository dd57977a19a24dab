pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cnidarium::{StateDelta, StateRead, StateWrite, Storage};
use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::llm::{ChatModel, ChatRequest};
use crate::progress::with_indicator;
use crate::prompts;

use types::{DebateTranscript, MemorySnapshot, MemoryUpdate};

// Storage prefixes; keys are `<prefix>/<name>`
const MEMORY_PREFIX: &str = "memory";
const DEBATE_PREFIX: &str = "debate";

fn snapshot_key() -> String {
    format!("{}/snapshot", MEMORY_PREFIX)
}
fn debate_key(id: &str) -> String {
    format!("{}/{}", DEBATE_PREFIX, id)
}

/// What the turn pipeline needs from user memory.
#[async_trait]
pub trait UserMemory: Send + Sync {
    /// Learn from a user message. Failures are logged, never returned.
    async fn record_message(&self, text: &str);

    async fn current_snapshot(&self) -> MemorySnapshot;
}

pub struct MemoryStore {
    storage: Storage,
    model: Arc<dyn ChatModel>,
    model_id: String,
    /// Write-through copy of the persisted snapshot.
    snapshot: RwLock<MemorySnapshot>,
}

impl MemoryStore {
    pub async fn new(data_dir: &Path, model: Arc<dyn ChatModel>, model_id: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let prefixes = vec![MEMORY_PREFIX.to_string(), DEBATE_PREFIX.to_string()];
        let storage = Storage::load(data_dir.to_path_buf(), prefixes)
            .await
            .context("Failed to init cnidarium storage")?;

        let snapshot = match storage.latest_snapshot().get_raw(&snapshot_key()).await? {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("Stored memory unreadable, starting empty: {}", e);
                MemorySnapshot::default()
            }),
            None => MemorySnapshot::default(),
        };

        Ok(Self {
            storage,
            model,
            model_id: model_id.to_string(),
            snapshot: RwLock::new(snapshot),
        })
    }

    async fn persist(&self, snapshot: &MemorySnapshot) -> Result<()> {
        let mut delta = StateDelta::new(self.storage.latest_snapshot());
        delta.put_raw(
            snapshot_key(),
            serde_json::to_vec(snapshot).context("serialize memory")?,
        );
        self.storage.commit(delta).await?;
        Ok(())
    }

    /// Erase everything remembered about the user.
    pub async fn forget(&self) -> Result<()> {
        let mut current = self.snapshot.write().await;
        let empty = MemorySnapshot::default();
        self.persist(&empty).await?;
        *current = empty;
        info!("user memory cleared");
        Ok(())
    }

    async fn analyze(&self, text: &str, previous: &MemorySnapshot) -> Result<MemoryUpdate> {
        let previous = serde_json::to_string_pretty(previous)?;
        let request = ChatRequest::instructed(
            &self.model_id,
            prompts::MEMORY_ANALYZER,
            format!(
                "Previous memory:\n{}\n\nNew message from user:\n{}\n\n\
                Extract any new personal information, interests, or preferences. \
                Return ONLY a JSON object with new information.",
                previous, text
            ),
        );
        let raw = with_indicator("Analyzing message", self.model.complete(request)).await?;
        MemoryUpdate::parse(&raw)
    }

    /// Persist a debate for `/agora debates`.
    pub async fn store_debate(&self, transcript: &DebateTranscript) -> Result<()> {
        let mut delta = StateDelta::new(self.storage.latest_snapshot());
        delta.put_raw(
            debate_key(&transcript.id),
            serde_json::to_vec(transcript).context("serialize DebateTranscript")?,
        );
        self.storage.commit(delta).await?;
        debug!(debate_id = %transcript.id, stages = transcript.stages.len(), "debate stored");
        Ok(())
    }

    /// Most recent debates first.
    pub async fn list_debates(&self, limit: usize) -> Result<Vec<DebateTranscript>> {
        let snapshot = self.storage.latest_snapshot();
        let mut stream = snapshot.prefix_raw(DEBATE_PREFIX);
        let mut results = Vec::new();

        while let Some(entry) = stream.next().await {
            match entry {
                Ok((_key, value)) => {
                    if let Ok(transcript) = serde_json::from_slice::<DebateTranscript>(&value) {
                        results.push(transcript);
                    }
                }
                Err(e) => {
                    warn!("Error reading debate stream: {}", e);
                }
            }
        }

        results.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        results.truncate(limit);
        Ok(results)
    }
}

#[async_trait]
impl UserMemory for MemoryStore {
    async fn record_message(&self, text: &str) {
        let previous = self.snapshot.read().await.clone();
        let update = match self.analyze(text, &previous).await {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, "memory update skipped");
                return;
            }
        };

        let mut current = self.snapshot.write().await;
        let mut next = current.clone();
        next.apply(update, chrono::Utc::now());
        if let Err(e) = self.persist(&next).await {
            warn!(error = %e, "failed to persist memory");
            return;
        }
        debug!(
            personal = next.personal_info.len(),
            interests = next.interests.len(),
            preferences = next.preferences.len(),
            "memory updated"
        );
        *current = next;
    }

    async fn current_snapshot(&self) -> MemorySnapshot {
        self.snapshot.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::{DebateState, Stage, StageEntry};
    use crate::testing::ScriptedModel;

    async fn open(dir: &Path, reply: &'static str) -> MemoryStore {
        let model = Arc::new(ScriptedModel::new(move |_| Ok(reply.to_string())));
        MemoryStore::new(dir, model, "fast").await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_message_updates_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(
            dir.path(),
            r#"{"personal_info": {"name": "Tom"}, "interests": ["Sailing"], "preferences": {}}"#,
        )
        .await;

        store.record_message("Hi, my name is Tom and I love sailing").await;
        let snapshot = store.current_snapshot().await;
        assert_eq!(snapshot.personal_info["name"], "Tom");
        assert!(snapshot.interests.contains("sailing"));
        assert!(snapshot.last_updated.is_some());

        store.forget().await.unwrap();
        assert!(store.current_snapshot().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_analysis_leaves_memory_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path(), "Nothing to extract here.").await;
        store.record_message("what's the weather").await;
        assert_eq!(store.current_snapshot().await, MemorySnapshot::default());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_debates_listed_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path(), "{}").await;
        for (id, at) in [("older", 100), ("newer", 200)] {
            store
                .store_debate(&DebateTranscript {
                    id: id.to_string(),
                    topic: "zoning".to_string(),
                    state: DebateState::Aborted,
                    fast_mode: false,
                    stages: vec![StageEntry {
                        stage: Stage::Proponent,
                        speaker: "LogicMaster".to_string(),
                        text: "For.".to_string(),
                    }],
                    recorded_at: at,
                })
                .await
                .unwrap();
        }
        let listed = store.list_debates(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "newer");
        assert_eq!(store.list_debates(1).await.unwrap().len(), 1);
    }
}
