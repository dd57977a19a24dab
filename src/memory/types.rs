use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::debate::{DebateState, StageEntry};

/// Values the analyzer emits when it has nothing real to say.
const JUNK: &[&str] = &["null", "none", "unknown", ""];
const JUNK_INTERESTS: &[&str] = &["me", "about", "about you"];
const JUNK_PREFERENCES: &[&str] = &["yes", "no"];

/// What we remember about the user. Read-only outside the memory store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub personal_info: BTreeMap<String, String>,
    /// Lower-cased, deduplicated.
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl MemorySnapshot {
    pub fn is_empty(&self) -> bool {
        self.personal_info.is_empty() && self.interests.is_empty() && self.preferences.is_empty()
    }

    /// The part of memory worth showing the model, or `None` if there is nothing.
    pub fn relevant_context(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        Some(serde_json::json!({
            "personal_info": self.personal_info,
            "interests": self.interests,
            "preferences": self.preferences,
        }))
    }

    /// Merge an analyzer update. Empty and junk values never overwrite
    /// anything; `last_updated` is stamped even when nothing changed.
    pub fn apply(&mut self, update: MemoryUpdate, now: DateTime<Utc>) {
        for (key, value) in update.personal_info.unwrap_or_default() {
            if let Some(value) = usable(&value, &[]) {
                self.personal_info.insert(key, value);
            }
        }
        for value in update.interests.unwrap_or_default() {
            if let Some(interest) = usable(&value, JUNK_INTERESTS) {
                self.interests.insert(interest.to_lowercase());
            }
        }
        for (key, value) in update.preferences.unwrap_or_default() {
            if let Some(value) = usable(&value, JUNK_PREFERENCES) {
                self.preferences.insert(key, value);
            }
        }
        self.last_updated = Some(now);
    }
}

/// A string value that is neither blank nor junk.
fn usable(value: &Value, extra_junk: &[&str]) -> Option<String> {
    let text = value.as_str()?.trim();
    let lower = text.to_lowercase();
    if JUNK.contains(&lower.as_str()) || extra_junk.contains(&lower.as_str()) {
        return None;
    }
    Some(text.to_string())
}

/// Raw analyzer output. Sections may be missing or null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryUpdate {
    #[serde(default)]
    pub personal_info: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub interests: Option<Vec<Value>>,
    #[serde(default)]
    pub preferences: Option<BTreeMap<String, Value>>,
}

impl MemoryUpdate {
    /// Parse analyzer output, tolerating prose or code fences around the
    /// object and a missing opening or closing brace.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let start = trimmed.find('{');
        let end = trimmed.rfind('}');
        let body = match (start, end) {
            (Some(s), Some(e)) if s < e => trimmed[s..=e].to_string(),
            (Some(s), _) => format!("{}}}", &trimmed[s..]),
            (None, Some(e)) => format!("{{{}", &trimmed[..=e]),
            (None, None) => format!("{{{}}}", trimmed),
        };
        serde_json::from_str(&body).context("memory analyzer returned invalid JSON")
    }
}

/// A debate as persisted for later review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateTranscript {
    /// blake3 of topic and timestamp.
    pub id: String,
    pub topic: String,
    pub state: DebateState,
    pub fast_mode: bool,
    pub stages: Vec<StageEntry>,
    pub recorded_at: i64,
}
