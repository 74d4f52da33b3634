// Test mocks for the scout pipeline.
//
// One mock per network boundary:
// - MockSearcher (WebSearcher): query -> results, counts calls
// - MockProbe (LivenessProbe): url -> status and final url
// - MockScraper (PageScraper): url -> html, tracks peak concurrent renders
// - MockLlm (LlmAdapter): resume id -> raw response, counts calls

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::resolver::{LivenessProbe, ProbeResponse};
use crate::scoring::LlmAdapter;
use crate::scraper::{PageScraper, RenderedPage};
use crate::search::{SearchResult, WebSearcher};

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Query-keyed search results. Unregistered queries return no results.
#[derive(Clone, Default)]
pub struct MockSearcher {
    searches: HashMap<String, Vec<SearchResult>>,
    failing: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, query: &str, results: Vec<SearchResult>) -> Self {
        self.searches.insert(query.to_string(), results);
        self
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|q| q == query) {
            anyhow::bail!("MockSearcher: search failed for {query}");
        }
        Ok(self
            .searches
            .get(query)
            .map(|r| r.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockProbe
// ---------------------------------------------------------------------------

/// URL-keyed probe statuses. Unregistered URLs fail like a refused connection
/// unless a default status is set.
#[derive(Clone, Default)]
pub struct MockProbe {
    statuses: HashMap<String, u16>,
    redirects: HashMap<String, String>,
    default_status: Option<u16>,
    calls: Arc<AtomicUsize>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_url(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    /// `url` redirects to `final_url`, which answers with `status`.
    pub fn on_redirect(mut self, url: &str, final_url: &str, status: u16) -> Self {
        self.redirects.insert(url.to_string(), final_url.to_string());
        self.statuses.insert(url.to_string(), status);
        self
    }

    pub fn default_status(mut self, status: u16) -> Self {
        self.default_status = Some(status);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessProbe for MockProbe {
    async fn probe(&self, url: &str) -> Result<ProbeResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .statuses
            .get(url)
            .copied()
            .or(self.default_status)
            .ok_or_else(|| anyhow::anyhow!("MockProbe: connection refused for {url}"))?;
        Ok(ProbeResponse {
            status,
            final_url: self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// MockScraper
// ---------------------------------------------------------------------------

/// URL-keyed rendered HTML. Returns `Err` for unregistered URLs unless a
/// fallback page is set.
#[derive(Clone, Default)]
pub struct MockScraper {
    pages: HashMap<String, String>,
    fallback: Option<String>,
    delay: Option<Duration>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    renders: Arc<AtomicUsize>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn on_any_page(mut self, html: &str) -> Self {
        self.fallback = Some(html.to_string());
        self
    }

    /// Hold each render for `delay`, so overlapping sessions become observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of renders ever in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageScraper for MockScraper {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.renders.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let html = self
            .pages
            .get(url)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockScraper: no page registered for {url}"))?;
        Ok(RenderedPage {
            url: url.to_string(),
            html,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockLlm
// ---------------------------------------------------------------------------

/// Returns a canned response per resume, matched on the resume id in the prompt.
#[derive(Clone, Default)]
pub struct MockLlm {
    by_resume: Vec<(String, String)>,
    fallback: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// A valid score with the given resume match for prompts about `resume_id`.
    pub fn on_resume(self, resume_id: &str, resume_match_score: u8) -> Self {
        let raw = serde_json::json!({
            "qa_relevance": 7,
            "visa_likelihood": "Medium",
            "resume_match_score": resume_match_score,
            "reason": format!("Match {resume_match_score} for {resume_id}."),
        })
        .to_string();
        self.on_resume_raw(resume_id, &raw)
    }

    pub fn on_resume_raw(mut self, resume_id: &str, raw: &str) -> Self {
        self.by_resume.push((resume_id.to_string(), raw.to_string()));
        self
    }

    pub fn respond_with(mut self, raw: &str) -> Self {
        self.fallback = Some(raw.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmAdapter for MockLlm {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.by_resume
            .iter()
            .find(|(id, _)| user.contains(&format!("Resume ({id})")))
            .map(|(_, raw)| raw.clone())
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| anyhow::anyhow!("MockLlm: no response registered"))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A career page listing the given `(href, text)` anchors.
pub fn career_page_html(links: &[(&str, &str)]) -> String {
    let anchors: String = links
        .iter()
        .map(|(href, text)| format!("<li><a href=\"{href}\">{text}</a></li>\n"))
        .collect();
    format!("<html><body><h1>Careers</h1><ul>\n{anchors}</ul></body></html>")
}
