use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

const SERPER_URL: &str = "https://google.serper.dev/search";
const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const BING_SEARCH_URL: &str = "https://www.bing.com/search";
/// Desktop browser identity sent on search and liveness requests.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

impl SearchResult {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: String::new(),
        }
    }
}

// --- WebSearcher trait ---

#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Results in rank order, at most `max_results`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;

    fn name(&self) -> &str;
}

// --- Serper (Google Search) ---

pub struct SerperSearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearcher {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to build Serper HTTP client")?,
        })
    }
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        debug!(query, max_results, "Serper search");

        let body = serde_json::json!({
            "q": query,
            "num": max_results,
            "gl": "uk",
        });

        let resp = self
            .client
            .post(SERPER_URL)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Serper API request failed")?
            .error_for_status()
            .context("Serper API returned an error status")?;

        let data: SerperResponse = resp
            .json()
            .await
            .context("Failed to parse Serper response")?;

        let results: Vec<SearchResult> = data
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .take(max_results)
            .map(|r| SearchResult {
                url: r.link,
                title: r.title,
                snippet: r.snippet,
            })
            .collect();

        debug!(query, count = results.len(), "Serper search complete");
        Ok(results)
    }

    fn name(&self) -> &str {
        "serper"
    }
}

// --- DuckDuckGo HTML endpoint ---

/// Keyless search against DuckDuckGo's HTML results page.
pub struct DuckDuckGoSearcher {
    client: reqwest::Client,
}

impl DuckDuckGoSearcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .context("Failed to build DuckDuckGo HTTP client")?,
        })
    }
}

#[async_trait]
impl WebSearcher for DuckDuckGoSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        debug!(query, max_results, "DuckDuckGo search");

        let html = self
            .client
            .post(DUCKDUCKGO_HTML_URL)
            .header("Accept-Language", "en-GB,en;q=0.9")
            .form(&[("q", query)])
            .send()
            .await
            .context("DuckDuckGo request failed")?
            .error_for_status()
            .context("DuckDuckGo returned an error status")?
            .text()
            .await
            .context("Failed to read DuckDuckGo response")?;

        let results = parse_duckduckgo_results(&html, max_results);
        debug!(query, count = results.len(), "DuckDuckGo search complete");
        Ok(results)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

/// Pull `a.result__a` links out of a DuckDuckGo HTML results page.
pub fn parse_duckduckgo_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let Ok(selector) = Selector::parse("a.result__a") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = unwrap_duckduckgo_redirect(href)?;
            let title = anchor.text().collect::<Vec<_>>().join(" ");
            Some(SearchResult::new(url, title.split_whitespace().collect::<Vec<_>>().join(" ")))
        })
        .take(max_results)
        .collect()
}

/// DuckDuckGo wraps result links as `//duckduckgo.com/l/?uddg=<target>`.
fn unwrap_duckduckgo_redirect(href: &str) -> Option<String> {
    let base = Url::parse("https://duckduckgo.com/").ok()?;
    let parsed = base.join(href).ok()?;

    let is_redirect = parsed
        .host_str()
        .is_some_and(|h| h.ends_with("duckduckgo.com"))
        && parsed.path().starts_with("/l/");
    if is_redirect {
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }

    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

// --- Bing HTML results ---

/// Keyless search against Bing's HTML results page.
pub struct BingSearcher {
    client: reqwest::Client,
}

impl BingSearcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .context("Failed to build Bing HTTP client")?,
        })
    }
}

#[async_trait]
impl WebSearcher for BingSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        debug!(query, max_results, "Bing search");

        let html = self
            .client
            .get(BING_SEARCH_URL)
            .header("Accept-Language", "en-GB,en;q=0.9")
            .query(&[("q", query)])
            .send()
            .await
            .context("Bing request failed")?
            .error_for_status()
            .context("Bing returned an error status")?
            .text()
            .await
            .context("Failed to read Bing response")?;

        let results = parse_bing_results(&html, max_results);
        debug!(query, count = results.len(), "Bing search complete");
        Ok(results)
    }

    fn name(&self) -> &str {
        "bing"
    }
}

/// Pull organic `li.b_algo h2 a` links out of a Bing results page.
pub fn parse_bing_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let Ok(selector) = Selector::parse("li.b_algo h2 a") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = Url::parse(href.trim()).ok()?;
            let external = matches!(url.scheme(), "http" | "https")
                && !url.host_str().is_some_and(|h| h.ends_with("bing.com"));
            if !external {
                return None;
            }
            let title = anchor.text().collect::<Vec<_>>().join(" ");
            Some(SearchResult::new(
                url.to_string(),
                title.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        })
        .take(max_results)
        .collect()
}

// --- Fallback chain ---

/// Tries each searcher in order until one returns results.
///
/// A backend that errors or comes back empty hands over to the next. The chain
/// fails only when every backend errored.
pub struct FallbackSearcher {
    searchers: Vec<Arc<dyn WebSearcher>>,
}

impl FallbackSearcher {
    pub fn new(searchers: Vec<Arc<dyn WebSearcher>>) -> Self {
        Self { searchers }
    }

    pub fn names(&self) -> Vec<&str> {
        self.searchers.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl WebSearcher for FallbackSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let mut last_error = None;
        let mut any_succeeded = false;

        for searcher in &self.searchers {
            match searcher.search(query, max_results).await {
                Ok(results) if !results.is_empty() => return Ok(results),
                Ok(_) => {
                    any_succeeded = true;
                    debug!(query, searcher = searcher.name(), "No results, trying next searcher");
                }
                Err(e) => {
                    warn!(query, searcher = searcher.name(), error = %e, "Search failed, trying next searcher");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_succeeded => Err(e.context("Every search backend failed")),
            _ => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
