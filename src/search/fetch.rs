use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::BROWSER_UA;

/// Pages shorter than this are treated exactly like a failed fetch.
pub const MIN_CONTENT_CHARS: usize = 200;

/// Markup that never carries article text.
const STRIP: &str = "script, style, meta, link, header, footer, nav, iframe, form, aside";

/// Semantic content containers, most specific news layouts last.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    ".article-body",
    ".article-content",
    ".story-body",
    ".story-content",
    "#article-body",
    "#story-body",
    "#content-body",
    ".main-content",
    ".post-content",
    ".entry-content",
    "[role=\"main\"]",
    "[role=\"article\"]",
];

const TEXT_BLOCKS: &str = "p, h1, h2, h3, h4, h5, h6";

/// Raw page retrieval.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<String>;
}

pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new() -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".parse()?,
        );
        headers.insert(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.5".parse()?);
        headers.insert(reqwest::header::CACHE_CONTROL, "no-cache".parse()?);
        headers.insert(reqwest::header::PRAGMA, "no-cache".parse()?);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(BROWSER_UA)
            .default_headers(headers)
            .build()
            .context("Failed to create page HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn get(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to fetch URL")?
            .error_for_status()
            .context("Page returned an error status")?;
        resp.text().await.context("Failed to read response body")
    }
}

pub struct ContentFetcher {
    source: Arc<dyn PageSource>,
    delay: Duration,
}

impl ContentFetcher {
    pub fn new(source: Arc<dyn PageSource>, delay: Duration) -> Self {
        Self { source, delay }
    }

    /// Fetch a result link and return its readable text, or `None` when the
    /// page can't be fetched or has less than [`MIN_CONTENT_CHARS`] of text.
    pub async fn fetch(&self, link: &str) -> Option<String> {
        let target = resolve_redirect(link);
        if target != link {
            debug!(from = link, to = %target, "resolved search redirect");
        }

        // Politeness delay so consecutive scrapes don't hammer anyone.
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let html = match self.source.get(&target).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %target, error = %e, "page fetch failed");
                return None;
            }
        };

        let content = extract_text(&html);
        let chars = content.chars().count();
        if chars < MIN_CONTENT_CHARS {
            warn!(url = %target, chars, "page content too short");
            return None;
        }

        info!(url = %target, chars, "page scraped");
        Some(content)
    }
}

fn absolutize(link: &str) -> String {
    let link = link.trim();
    if link.starts_with("//") {
        format!("https:{}", link)
    } else if link.starts_with("/l/") {
        format!("https://duckduckgo.com{}", link)
    } else {
        link.to_string()
    }
}

/// Unwrap DuckDuckGo's `/l/?uddg=<target>` click-tracking links. Anything
/// else is returned as-is (after making protocol-relative links absolute).
pub fn resolve_redirect(link: &str) -> String {
    let abs = absolutize(link);
    let Ok(parsed) = Url::parse(&abs) else {
        return abs;
    };
    let is_ddg = parsed
        .host_str()
        .map(|h| h.to_ascii_lowercase().ends_with("duckduckgo.com"))
        .unwrap_or(false);
    if !is_ddg || !parsed.path().starts_with("/l/") {
        return abs;
    }

    parsed
        .query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| v.starts_with("http://") || v.starts_with("https://"))
        .unwrap_or(abs)
}

fn block_text(root: ElementRef<'_>, blocks: &Selector) -> String {
    root.select(blocks)
        .map(|el| el.text().collect::<String>())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trim every line and drop blank ones.
fn normalize(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract readable text: paragraphs and headings from the first semantic
/// container, then from the body, then whatever html2text makes of the page.
pub fn extract_text(html: &str) -> String {
    let mut document = Html::parse_document(html);

    if let Ok(strip) = Selector::parse(STRIP) {
        let ids: Vec<_> = document.select(&strip).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    let Ok(blocks) = Selector::parse(TEXT_BLOCKS) else {
        return String::new();
    };

    let container = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| document.select(&sel).next());

    let text = match container {
        Some(container) => block_text(container, &blocks),
        None => Selector::parse("body")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .map(|body| block_text(body, &blocks))
            .unwrap_or_default(),
    };

    if !text.trim().is_empty() {
        return normalize(&text);
    }

    let stripped = document.root_element().html();
    let fallback = html2text::from_read(stripped.as_bytes(), 120).unwrap_or_default();
    normalize(&fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{article_page, StaticPages};

    fn long_paragraph(word: &str) -> String {
        std::iter::repeat(word).take(60).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_resolve_ddg_redirect() {
        let link = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fnews.example%2Fstory%3Fid%3D4&rut=abc";
        assert_eq!(resolve_redirect(link), "https://news.example/story?id=4");
    }

    #[test]
    fn test_plain_links_pass_through() {
        assert_eq!(
            resolve_redirect("https://news.example/a"),
            "https://news.example/a"
        );
        assert_eq!(resolve_redirect("//cdn.example/x"), "https://cdn.example/x");
    }

    #[test]
    fn test_prefers_article_over_chrome() {
        let html = format!(
            r#"<html><body>
            <nav><p>Home Sports Weather</p></nav>
            <div><p>Sidebar promo</p></div>
            <article><h1>Headline</h1><p>{}</p><script>var x = 1;</script></article>
            <footer><p>Copyright</p></footer>
            </body></html>"#,
            long_paragraph("council")
        );
        let text = extract_text(&html);
        assert!(text.starts_with("Headline\n"));
        assert!(text.contains("council council"));
        assert!(!text.contains("Sidebar"));
        assert!(!text.contains("Home Sports"));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_falls_back_to_body_paragraphs() {
        let html = "<html><body><div><p>  first   line </p>\n\n<p>second</p></div></body></html>";
        assert_eq!(extract_text(html), "first line\nsecond");
    }

    #[test]
    fn test_falls_back_to_whole_document_text() {
        let html = "<html><body><div>loose text without paragraphs</div></body></html>";
        assert!(extract_text(html).contains("loose text without paragraphs"));
    }

    #[tokio::test]
    async fn test_short_pages_are_rejected() {
        let pages = StaticPages::new()
            .with_page("https://short.example/", "<html><body><p>Too short.</p></body></html>");
        let fetcher = ContentFetcher::new(Arc::new(pages), Duration::ZERO);
        assert!(fetcher.fetch("https://short.example/").await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_follows_redirect_and_is_idempotent() {
        let pages = Arc::new(
            StaticPages::new().with_page("https://news.example/story", article_page("budget")),
        );
        let fetcher = ContentFetcher::new(pages.clone(), Duration::ZERO);
        let link = "https://duckduckgo.com/l/?uddg=https%3A%2F%2Fnews.example%2Fstory";

        let first = fetcher.fetch(link).await.expect("content");
        let second = fetcher.fetch(link).await.expect("content");
        assert_eq!(first, second);
        assert!(first.chars().count() >= MIN_CONTENT_CHARS);
        assert_eq!(pages.fetched(), vec!["https://news.example/story"; 2]);
    }

    #[tokio::test]
    async fn test_fetch_error_is_absent() {
        let fetcher = ContentFetcher::new(Arc::new(StaticPages::new()), Duration::ZERO);
        assert!(fetcher.fetch("https://missing.example/").await.is_none());
    }
}
