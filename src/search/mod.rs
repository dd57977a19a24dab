pub mod fetch;
pub mod query;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

pub use fetch::{ContentFetcher, HttpPageSource, PageSource};
pub use query::QueryComposer;

pub const MAX_RESULTS: usize = 10;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Links we never try to scrape: documents and platforms that don't serve article text.
const DENYLIST: &[&str] = &[
    ".pdf",
    ".doc",
    ".docx",
    ".ppt",
    ".pptx",
    "twitter.com",
    "facebook.com",
    "instagram.com",
    "youtube.com",
    "tiktok.com",
];

const NO_SNIPPET: &str = "No description available";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Position in the filtered result list.
    pub id: usize,
    pub link: String,
    pub snippet: String,
}

/// Where results pages come from.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn results_page(&self, query: &str) -> Result<String>;
}

/// DuckDuckGo's script-free HTML endpoint.
pub struct DuckDuckGo {
    client: reqwest::Client,
}

impl DuckDuckGo {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(BROWSER_UA)
            .build()
            .context("Failed to create search HTTP client")?;
        Ok(Self { client })
    }

    fn search_url(query: &str) -> Result<Url> {
        let mut url = Url::parse("https://html.duckduckgo.com/html/")?;
        url.query_pairs_mut().append_pair("q", query.trim());
        Ok(url)
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGo {
    async fn results_page(&self, query: &str) -> Result<String> {
        let url = Self::search_url(query)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("Search request failed")?
            .error_for_status()
            .context("Search returned an error status")?;
        resp.text().await.context("Failed to read search page")
    }
}

pub struct ResultProvider {
    backend: Arc<dyn SearchBackend>,
}

impl ResultProvider {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Run `query` and return up to ten usable results. Never fails: a
    /// backend error is logged and reported as no results.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        let html = match self.backend.results_page(query).await {
            Ok(html) => html,
            Err(e) => {
                warn!(query, error = %e, "search backend failed");
                return Vec::new();
            }
        };

        let results = parse_results(&html);
        if results.is_empty() {
            warn!(query, "no search results");
        } else {
            info!(query, count = results.len(), "search results");
        }
        results
    }
}

fn is_denied(link: &str) -> bool {
    let lower = link.to_lowercase();
    DENYLIST.iter().any(|d| lower.contains(d))
}

/// Parse a DuckDuckGo HTML results page. Denied links are dropped before
/// numbering, so ids are always `0..len`.
pub fn parse_results(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let (Ok(container), Ok(title), Ok(snippet)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse("a.result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for result in document.select(&container) {
        if out.len() >= MAX_RESULTS {
            break;
        }

        let Some(anchor) = result.select(&title).next() else {
            continue;
        };
        let link = anchor.value().attr("href").unwrap_or("").trim();
        if link.is_empty() {
            continue;
        }
        if is_denied(link) {
            debug!(link, "skipping denied link");
            continue;
        }

        let text = result
            .select(&snippet)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SNIPPET.to_string());

        out.push(SearchResult {
            id: out.len(),
            link: link.to_string(),
            snippet: text,
        });
    }

    out
}
