//! Scripted collaborators for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::llm::{ChatModel, ChatRequest, ChatResponse, Role, TextDelta};
use crate::memory::types::MemorySnapshot;
use crate::memory::UserMemory;
use crate::search::{PageSource, SearchBackend};

type Script = Box<dyn Fn(&ChatRequest) -> Result<String> + Send + Sync>;

/// A model whose answers come from a closure over the request. Streaming
/// requests get the answer back split into word-sized deltas.
pub struct ScriptedModel {
    script: Script,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(script: impl Fn(&ChatRequest) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(anyhow::anyhow!("model offline")))
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose system instruction is `system`.
    pub fn requests_for(&self, system: &str) -> Vec<ChatRequest> {
        self.requests()
            .into_iter()
            .filter(|r| system_prompt(r) == Some(system))
            .collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let text = (self.script)(&request)?;
        if !request.stream {
            return Ok(ChatResponse::Complete(text));
        }
        let deltas: Vec<Result<TextDelta>> = text
            .split_inclusive(' ')
            .map(|w| Ok(TextDelta(w.to_string())))
            .collect();
        Ok(ChatResponse::Streaming(stream::iter(deltas).boxed()))
    }
}

pub fn system_prompt(request: &ChatRequest) -> Option<&str> {
    request
        .messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
}

pub fn user_prompt(request: &ChatRequest) -> &str {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

pub struct StaticBackend {
    page: Option<String>,
}

impl StaticBackend {
    pub fn new(page: String) -> Self {
        Self { page: Some(page) }
    }

    pub fn failing() -> Self {
        Self { page: None }
    }
}

#[async_trait]
impl SearchBackend for StaticBackend {
    async fn results_page(&self, _query: &str) -> Result<String> {
        self.page
            .clone()
            .ok_or_else(|| anyhow::anyhow!("search backend unreachable"))
    }
}

#[derive(Default)]
pub struct StaticPages {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    /// Every URL requested, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for StaticPages {
    async fn get(&self, url: &str) -> Result<String> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 for {}", url))
    }
}

#[derive(Default)]
pub struct StaticMemory {
    pub snapshot: MemorySnapshot,
    recorded: Mutex<Vec<String>>,
}

impl StaticMemory {
    pub fn with_snapshot(snapshot: MemorySnapshot) -> Self {
        Self {
            snapshot,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<String> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserMemory for StaticMemory {
    async fn record_message(&self, text: &str) {
        self.recorded.lock().unwrap().push(text.to_string());
    }

    async fn current_snapshot(&self) -> MemorySnapshot {
        self.snapshot.clone()
    }
}

/// A DuckDuckGo-shaped results page listing `links` in order.
pub fn results_page(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|link| {
            format!(
                r#"<div class="result results_links web-result">
                  <h2 class="result__title"><a class="result__a" href="{link}">Title</a></h2>
                  <a class="result__snippet" href="{link}">Snippet for {link}</a>
                </div>"#,
                link = link
            )
        })
        .collect();
    format!(
        r#"<html><body><div id="links" class="results">{}</div></body></html>"#,
        items
    )
}

/// An article page whose body text comfortably clears the length floor.
pub fn article_page(topic: &str) -> String {
    let sentence = format!("Officials announced new details about the {} plan today. ", topic);
    format!(
        "<html><head><title>{topic}</title></head><body><nav><p>Menu</p></nav>\
         <article><h1>{topic} update</h1><p>{body}</p></article></body></html>",
        topic = topic,
        body = sentence.repeat(8)
    )
}

/// `n` words of filler prose.
pub fn words(n: usize) -> String {
    const VOCAB: &[&str] = &[
        "the", "council", "voted", "on", "a", "sweeping", "housing", "reform", "after", "months",
        "of", "debate", "and", "protest",
    ];
    (0..n)
        .map(|i| VOCAB[i % VOCAB.len()])
        .collect::<Vec<_>>()
        .join(" ")
}
