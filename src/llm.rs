use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered chat history for one channel. Only ever grows during a turn,
/// except for the search step which swaps the pending user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    turns: Vec<Message>,
}

impl Conversation {
    pub fn seeded(system: impl Into<String>) -> Self {
        Self {
            turns: vec![Message::system(system)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.turns.push(message);
    }

    pub fn pop(&mut self) -> Option<Message> {
        self.turns.pop()
    }

    pub fn last(&self) -> Option<&Message> {
        self.turns.last()
    }

    /// Content of the most recent turn, empty when there is none.
    pub fn last_content(&self) -> &str {
        self.turns.last().map(|m| m.content.as_str()).unwrap_or("")
    }

    pub fn messages(&self) -> &[Message] {
        &self.turns
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(turns: Vec<Message>) -> Self {
        Self { turns }
    }
}

/// The two model identifiers the assistant switches between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Models {
    pub fast: String,
    pub thorough: String,
}

impl Models {
    pub fn from_env() -> Self {
        let thorough =
            dotenv::var("LLM_MODEL").unwrap_or_else(|_| "deepseek-r1:7b".to_string());
        let fast = dotenv::var("LLM_FAST_MODEL").unwrap_or_else(|_| "llama3.2:3b".to_string());
        Self { fast, thorough }
    }

    pub fn select(&self, fast_mode: bool) -> &str {
        if fast_mode {
            &self.fast
        } else {
            &self.thorough
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub stream: bool,
    pub timeout: Option<Duration>,
}

impl ChatRequest {
    pub fn new(model: &str, messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: model.to_string(),
            stream: false,
            timeout: None,
        }
    }

    /// Shorthand for the common `[system, user]` exchange.
    pub fn instructed(model: &str, system: &str, user: impl Into<String>) -> Self {
        Self::new(model, vec![Message::system(system), Message::user(user)])
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDelta(pub String);

pub enum ChatResponse {
    Complete(String),
    Streaming(BoxStream<'static, Result<TextDelta>>),
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatResponse::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            ChatResponse::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// Drain a response into its full text. Streams are consumed to the end;
/// an error mid-stream fails the whole response.
pub async fn collect_text(response: ChatResponse) -> Result<String> {
    match response {
        ChatResponse::Complete(text) => Ok(text),
        ChatResponse::Streaming(mut deltas) => {
            let mut text = String::new();
            let mut chunks = 0usize;
            while let Some(delta) = deltas.next().await {
                text.push_str(&delta?.0);
                chunks += 1;
            }
            debug!(chunks, len = text.len(), "stream drained");
            Ok(text)
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Chat and wait for the full text, whichever shape the response takes.
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let response = self.chat(request).await?;
        collect_text(response).await
    }
}

/// OpenAI-compatible chat completions client (Ollama, LM Studio, vLLM).
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
        let api_key = dotenv::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": request.stream,
            "temperature": 0.3,
            "max_tokens": 2048,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        let resp = req
            .send()
            .await
            .context("LLM request failed")?
            .error_for_status()
            .context("LLM returned an error status")?;

        if request.stream {
            return Ok(ChatResponse::Streaming(sse_deltas(resp)));
        }

        let text = resp.text().await.context("Failed to read LLM response")?;
        let json: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse LLM JSON")?;

        // Extract content from choices[0].message.content (handle null)
        let content = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .unwrap_or("")
            .to_string();

        Ok(ChatResponse::Complete(content))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Delta(String),
    Done,
    Ignore,
}

fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseEvent::Ignore;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    let Ok(json) = serde_json::from_str::<serde_json::Value>(data) else {
        return SseEvent::Ignore;
    };
    match json["choices"]
        .get(0)
        .and_then(|c| c["delta"]["content"].as_str())
    {
        Some(content) if !content.is_empty() => SseEvent::Delta(content.to_string()),
        _ => SseEvent::Ignore,
    }
}

/// Turn an SSE body into content deltas. Bytes are buffered until a full
/// line arrives so multi-byte characters split across chunks survive.
fn sse_deltas(resp: reqwest::Response) -> BoxStream<'static, Result<TextDelta>> {
    let bytes = resp.bytes_stream().boxed();
    let state = (bytes, Vec::<u8>::new(), false);

    stream::unfold(state, |(mut bytes, mut buf, mut finished)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                match parse_sse_line(&String::from_utf8_lossy(&line)) {
                    SseEvent::Delta(text) => {
                        return Some((Ok(TextDelta(text)), (bytes, buf, finished)))
                    }
                    SseEvent::Done => return None,
                    SseEvent::Ignore => continue,
                }
            }
            if finished {
                let rest = std::mem::take(&mut buf);
                return match parse_sse_line(&String::from_utf8_lossy(&rest)) {
                    SseEvent::Delta(text) => Some((Ok(TextDelta(text)), (bytes, buf, finished))),
                    _ => None,
                };
            }
            match bytes.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    buf.clear();
                    finished = true;
                    let err = anyhow::Error::new(e).context("LLM stream interrupted");
                    return Some((Err(err), (bytes, buf, finished)));
                }
                None => finished = true,
            }
        }
    })
    .boxed()
}
