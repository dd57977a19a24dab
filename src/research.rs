use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::llm::{ChatModel, ChatRequest, Conversation, Message};
use crate::progress::with_indicator;
use crate::prompts;
use crate::retry::{invoke_with_fallback, RetryPolicy};
use crate::search::fetch::MIN_CONTENT_CHARS;
use crate::search::{
    ContentFetcher, PageSource, QueryComposer, ResultProvider, SearchBackend, SearchResult,
};
use crate::state::AssistantConfig;

/// Only this much page text is shown to the validator.
const VALIDATION_WINDOW_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// The backend returned nothing for the composed query.
    NoResults,
    /// The model never produced a usable index.
    SelectionFailed,
    /// Every candidate was fetched or validated and rejected.
    Exhausted,
}

impl NotFoundReason {
    /// Discussion prompt used in place of research.
    pub fn fallback_context(&self) -> &'static str {
        match self {
            NotFoundReason::NoResults => prompts::GENERIC_ASPECTS,
            NotFoundReason::SelectionFailed | NotFoundReason::Exhausted => {
                prompts::NO_USEFUL_CONTENT
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchOutcome {
    Found(String),
    NotFound(NotFoundReason),
}

impl ResearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, ResearchOutcome::Found(_))
    }

    /// Text to hand a debate speaker: the content, or the fallback prompt.
    pub fn context(&self) -> &str {
        match self {
            ResearchOutcome::Found(content) => content,
            ResearchOutcome::NotFound(reason) => reason.fallback_context(),
        }
    }
}

/// Drop reasoning markers left by thinking models and flatten to one line.
pub fn strip_reasoning(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let line = line.trim();
            !line.starts_with("<think>") && !line.starts_with("</think>")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Parse a selection answer: digits only, and inside the candidate list.
fn parse_index(answer: &str, len: usize) -> Option<usize> {
    let answer = answer.trim();
    if answer.is_empty() || !answer.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    answer.parse::<usize>().ok().filter(|i| *i < len)
}

fn selection_prompt(candidates: &[SearchResult], prompt: &str, query: &str) -> String {
    let listing = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}\n   {}", i, c.link, c.snippet))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "SEARCH_RESULTS:\n{}\nUSER_PROMPT: {}\nSEARCH_QUERY: {}",
        listing, prompt, query
    )
}

/// Finds one piece of validated web content for a conversation.
pub struct ResearchResolver {
    composer: QueryComposer,
    provider: ResultProvider,
    fetcher: ContentFetcher,
    model: Arc<dyn ChatModel>,
    model_id: String,
    selection_attempts: u32,
    validation_timeout: Duration,
}

impl ResearchResolver {
    /// Query composition, selection and validation all run on `fast_model`.
    pub fn new(
        model: Arc<dyn ChatModel>,
        fast_model: &str,
        search: Arc<dyn SearchBackend>,
        pages: Arc<dyn PageSource>,
        config: &AssistantConfig,
    ) -> Self {
        Self {
            composer: QueryComposer::new(model.clone(), fast_model),
            provider: ResultProvider::new(search),
            fetcher: ContentFetcher::new(pages, config.fetch_delay()),
            model,
            model_id: fast_model.to_string(),
            selection_attempts: config.selection_attempts,
            validation_timeout: config.validation_timeout(),
        }
    }

    /// Search for content supporting the conversation's last message.
    /// `purpose` only labels the logs. Each candidate is tried at most once,
    /// so there are never more selection rounds than initial results.
    pub async fn resolve(
        &self,
        conversation: &Conversation,
        purpose: &str,
        limit: usize,
    ) -> ResearchOutcome {
        let prompt = strip_reasoning(conversation.last_content());
        let topic = Conversation::from(vec![Message::user(prompt.clone())]);
        let query = self.composer.compose(&topic).await;

        let mut candidates = self.provider.search(&query).await;
        if candidates.is_empty() {
            info!(purpose, query = %query, "research found no results");
            return ResearchOutcome::NotFound(NotFoundReason::NoResults);
        }

        while !candidates.is_empty() {
            let Some(index) = self.select(&candidates, &prompt, &query).await else {
                warn!(purpose, "no usable result selection");
                return ResearchOutcome::NotFound(NotFoundReason::SelectionFailed);
            };

            let candidate = candidates.remove(index);
            info!(purpose, link = %candidate.link, remaining = candidates.len(), "result selected");

            let Some(content) = self.fetcher.fetch(&candidate.link).await else {
                continue;
            };
            if self.validate(&content, &prompt, &query).await {
                info!(purpose, link = %candidate.link, "research content accepted");
                return ResearchOutcome::Found(truncate_chars(&content, limit));
            }
            debug!(link = %candidate.link, "content not useful, trying next result");
        }

        warn!(purpose, "all results rejected");
        ResearchOutcome::NotFound(NotFoundReason::Exhausted)
    }

    async fn select(&self, candidates: &[SearchResult], prompt: &str, query: &str) -> Option<usize> {
        let request = ChatRequest::instructed(
            &self.model_id,
            prompts::BEST_RESULT,
            selection_prompt(candidates, prompt, query),
        );
        let len = candidates.len();

        with_indicator(
            "Selecting best result",
            invoke_with_fallback(
                "select result",
                RetryPolicy::attempts(self.selection_attempts),
                None,
                || self.model.complete(request.clone()),
                |answer| parse_index(answer, len).map(Some),
            ),
        )
        .await
    }

    async fn validate(&self, content: &str, prompt: &str, query: &str) -> bool {
        if content.chars().count() < MIN_CONTENT_CHARS {
            return false;
        }

        let request = ChatRequest::instructed(
            &self.model_id,
            prompts::CONTAINS_DATA,
            format!(
                "PAGE_TEXT: {} \nUSER_PROMPT: {} \nSEARCH_QUERY: {}",
                truncate_chars(content, VALIDATION_WINDOW_CHARS),
                prompt,
                query
            ),
        )
        .with_timeout(self.validation_timeout);

        with_indicator(
            "Validating content",
            invoke_with_fallback(
                "validate content",
                RetryPolicy::once().with_timeout(self.validation_timeout),
                false,
                || self.model.complete(request.clone()),
                |answer| Some(answer.to_lowercase().contains("true")),
            ),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        article_page, results_page, system_prompt, user_prompt, ScriptedModel, StaticBackend,
        StaticPages,
    };

    fn config() -> AssistantConfig {
        AssistantConfig {
            fetch_delay_ms: 0,
            ..AssistantConfig::default()
        }
    }

    fn resolver(
        model: Arc<ScriptedModel>,
        backend: StaticBackend,
        pages: Arc<StaticPages>,
    ) -> ResearchResolver {
        ResearchResolver::new(model, "fast", Arc::new(backend), pages, &config())
    }

    fn asking(text: &str) -> Conversation {
        Conversation::from(vec![Message::user(text)])
    }

    #[test]
    fn test_strip_reasoning_lines() {
        let text = "<think>\nhmm, let me see\n</think>\nRent caps\nare back";
        assert_eq!(strip_reasoning(text), "hmm, let me see Rent caps are back");
        assert_eq!(strip_reasoning("  <think> inline"), "");
    }

    #[test]
    fn test_parse_index_rules() {
        assert_eq!(parse_index(" 2\n", 3), Some(2));
        assert_eq!(parse_index("3", 3), None);
        assert_eq!(parse_index("-1", 3), None);
        assert_eq!(parse_index("Result 1", 3), None);
        assert_eq!(parse_index("", 3), None);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_no_results_carries_generic_aspects() {
        let model = Arc::new(ScriptedModel::new(|_| Ok("latest housing news".to_string())));
        let r = resolver(
            model,
            StaticBackend::new(results_page(&[])),
            Arc::new(StaticPages::new()),
        );
        let outcome = r.resolve(&asking("housing"), "test", 2000).await;
        assert_eq!(outcome, ResearchOutcome::NotFound(NotFoundReason::NoResults));
        assert_eq!(outcome.context(), prompts::GENERIC_ASPECTS);
    }

    #[tokio::test]
    async fn test_selection_failure_after_two_attempts() {
        let model = Arc::new(ScriptedModel::new(|req| {
            Ok(match system_prompt(req) {
                Some(s) if s == prompts::BEST_RESULT => "the first one".to_string(),
                _ => "latest housing news".to_string(),
            })
        }));
        let r = resolver(
            model.clone(),
            StaticBackend::new(results_page(&["https://a.example/"])),
            Arc::new(StaticPages::new()),
        );
        let outcome = r.resolve(&asking("housing"), "test", 2000).await;
        assert_eq!(outcome, ResearchOutcome::NotFound(NotFoundReason::SelectionFailed));
        assert_eq!(model.requests_for(prompts::BEST_RESULT).len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_candidates_are_never_revisited() {
        let links = ["https://a.example/", "https://b.example/", "https://c.example/"];
        let pages = Arc::new(
            links
                .iter()
                .fold(StaticPages::new(), |p, l| p.with_page(l, article_page("transit"))),
        );
        // Always pick the first listed candidate, never accept the content.
        let model = Arc::new(ScriptedModel::new(|req| {
            Ok(match system_prompt(req) {
                Some(s) if s == prompts::BEST_RESULT => "0".to_string(),
                Some(s) if s == prompts::CONTAINS_DATA => "False".to_string(),
                _ => "latest transit news".to_string(),
            })
        }));
        let r = resolver(model.clone(), StaticBackend::new(results_page(&links)), pages.clone());

        let outcome = r.resolve(&asking("transit"), "test", 2000).await;
        assert_eq!(outcome, ResearchOutcome::NotFound(NotFoundReason::Exhausted));
        assert_eq!(outcome.context(), prompts::NO_USEFUL_CONTENT);
        assert_eq!(pages.fetched(), links.to_vec());

        let selections = model.requests_for(prompts::BEST_RESULT);
        assert_eq!(selections.len(), links.len());
        // Each round lists one candidate fewer.
        assert!(user_prompt(&selections[1]).contains("https://b.example/"));
        assert!(!user_prompt(&selections[1]).contains("https://a.example/"));
        assert!(!user_prompt(&selections[2]).contains("1. "));
    }

    #[tokio::test]
    async fn test_found_content_is_truncated() {
        let pages = Arc::new(
            StaticPages::new()
                .with_page("https://b.example/", article_page("budget")),
        );
        let model = Arc::new(ScriptedModel::new(|req| {
            Ok(match system_prompt(req) {
                Some(s) if s == prompts::BEST_RESULT => "1".to_string(),
                Some(s) if s == prompts::CONTAINS_DATA => "TRUE, it is relevant".to_string(),
                _ => "latest budget news".to_string(),
            })
        }));
        let r = resolver(
            model.clone(),
            StaticBackend::new(results_page(&["https://a.example/", "https://b.example/"])),
            pages.clone(),
        );

        let outcome = r
            .resolve(&asking("<think>\nplan\n</think>\nbudget vote"), "test", 50)
            .await;
        match outcome {
            ResearchOutcome::Found(content) => {
                assert_eq!(content.chars().count(), 50);
                assert!(content.starts_with("budget update"));
            }
            other => panic!("expected content, got {:?}", other),
        }
        assert_eq!(pages.fetched(), vec!["https://b.example/"]);

        let validation = &model.requests_for(prompts::CONTAINS_DATA)[0];
        assert!(user_prompt(validation).contains("USER_PROMPT: plan budget vote"));
        assert_eq!(validation.timeout, Some(Duration::from_secs(15)));
    }

    #[tokio::test]
    async fn test_unfetchable_and_short_pages_are_skipped() {
        // a is not served, b is under the content floor, c is a real article.
        let links = ["https://a.example/", "https://b.example/", "https://c.example/"];
        let pages = Arc::new(
            StaticPages::new()
                .with_page(links[1], "<html><body><p>Too short.</p></body></html>")
                .with_page(links[2], article_page("ferry")),
        );
        let model = Arc::new(ScriptedModel::new(|req| {
            Ok(match system_prompt(req) {
                Some(s) if s == prompts::BEST_RESULT => "0".to_string(),
                Some(s) if s == prompts::CONTAINS_DATA => "True".to_string(),
                _ => "latest ferry news".to_string(),
            })
        }));
        let r = resolver(model.clone(), StaticBackend::new(results_page(&links)), pages.clone());

        let outcome = r.resolve(&asking("ferry schedule"), "test", 2000).await;
        match outcome {
            ResearchOutcome::Found(content) => assert!(content.starts_with("ferry update")),
            other => panic!("expected content, got {:?}", other),
        }
        assert_eq!(pages.fetched(), links.to_vec());

        let selections = model.requests_for(prompts::BEST_RESULT);
        assert_eq!(selections.len(), 3);
        assert!(!user_prompt(&selections[1]).contains(links[0]));
        assert!(!user_prompt(&selections[2]).contains(links[1]));
        // Only the page that survived fetching reaches the validator.
        assert_eq!(model.requests_for(prompts::CONTAINS_DATA).len(), 1);
    }

    #[tokio::test]
    async fn test_validation_error_counts_as_invalid() {
        let pages = Arc::new(StaticPages::new().with_page("https://a.example/", article_page("x")));
        let model = Arc::new(ScriptedModel::new(|req| match system_prompt(req) {
            Some(s) if s == prompts::BEST_RESULT => Ok("0".to_string()),
            Some(s) if s == prompts::CONTAINS_DATA => Err(anyhow::anyhow!("timed out")),
            _ => Ok("latest x".to_string()),
        }));
        let r = resolver(
            model,
            StaticBackend::new(results_page(&["https://a.example/"])),
            pages,
        );
        let outcome = r.resolve(&asking("x"), "test", 2000).await;
        assert_eq!(outcome, ResearchOutcome::NotFound(NotFoundReason::Exhausted));
    }
}
