use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use visa_scout_common::{CareerPage, PostingCandidate};

use crate::pool::WorkerPool;
use crate::postings::{extract_candidates, RoleFilter};

/// Fully rendered DOM of a page, after client-side scripts ran.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL the document was loaded from. Relative links resolve against it
    /// unless the document declares a `<base href>`.
    pub url: String,
    pub html: String,
}

// --- PageScraper trait ---

#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage>;

    fn name(&self) -> &str;
}

fn ensure_http(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).context("Invalid URL")?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("Only http/https URLs are allowed, got: {}", parsed.scheme());
    }
    Ok(())
}

// --- Local headless Chromium ---

/// Renders with a local `chromium --headless --dump-dom` process per page.
pub struct ChromeScraper {
    chrome_bin: String,
    timeout: Duration,
}

impl ChromeScraper {
    pub fn new(chrome_bin: &str, timeout: Duration) -> Self {
        info!(chrome_bin, "Using ChromeScraper (dump-dom)");
        Self {
            chrome_bin: chrome_bin.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl PageScraper for ChromeScraper {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        ensure_http(url)?;
        let profile_dir = tempfile::tempdir().context("Failed to create temp profile dir")?;

        debug!(url, scraper = "chrome", "Rendering page");

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.chrome_bin)
                .args([
                    "--headless",
                    "--no-sandbox",
                    "--disable-gpu",
                    "--disable-dev-shm-usage",
                    &format!("--user-data-dir={}", profile_dir.path().display()),
                    "--dump-dom",
                    url,
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .with_context(|| format!("Chrome timed out after {}s", self.timeout.as_secs()))?
        .with_context(|| format!("Failed to run {}", self.chrome_bin))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Chrome exited with {}: {}", output.status, stderr.trim());
        }
        if output.stdout.is_empty() {
            anyhow::bail!("Chrome returned an empty DOM");
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(url, scraper = "chrome", bytes = html.len(), "Rendered");
        Ok(RenderedPage {
            url: url.to_string(),
            html,
        })
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

// --- Browserless ---

pub struct BrowserlessScraper {
    client: browserless_client::BrowserlessClient,
}

impl BrowserlessScraper {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        info!(base_url, "Using BrowserlessScraper");
        Ok(Self {
            client: browserless_client::BrowserlessClient::new(base_url, token, timeout)?,
        })
    }
}

#[async_trait]
impl PageScraper for BrowserlessScraper {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        ensure_http(url)?;
        debug!(url, scraper = "browserless", "Rendering page");

        let html = self
            .client
            .content(url)
            .await
            .context("Browserless content request failed")?;
        if html.trim().is_empty() {
            anyhow::bail!("Browserless returned an empty document");
        }

        debug!(url, scraper = "browserless", bytes = html.len(), "Rendered");
        Ok(RenderedPage {
            url: url.to_string(),
            html,
        })
    }

    fn name(&self) -> &str {
        "browserless"
    }
}

// --- Fan-out over career pages ---

#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    /// Candidates in career-page order, then document order.
    pub candidates: Vec<PostingCandidate>,
    pub pages_rendered: usize,
    pub pages_failed: usize,
}

/// Renders career pages through a bounded pool and extracts role postings.
pub struct PostingScraper {
    scraper: Arc<dyn PageScraper>,
    pool: WorkerPool,
    filter: RoleFilter,
    render_timeout: Duration,
}

impl PostingScraper {
    pub fn new(
        scraper: Arc<dyn PageScraper>,
        pool: WorkerPool,
        filter: RoleFilter,
        render_timeout: Duration,
    ) -> Self {
        Self {
            scraper,
            pool,
            filter,
            render_timeout,
        }
    }

    async fn render_one(&self, page: &CareerPage) -> Result<RenderedPage> {
        // The deadline starts once a session slot is held, not while queued.
        self.pool
            .run(async {
                tokio::time::timeout(self.render_timeout, self.scraper.render(&page.url)).await
            })
            .await?
            .map_err(|_| {
                anyhow::anyhow!("render timed out after {}s", self.render_timeout.as_secs())
            })?
    }

    pub async fn scrape_all(&self, pages: &[CareerPage]) -> ScrapeOutcome {
        info!(
            pages = pages.len(),
            sessions = self.pool.slots(),
            scraper = self.scraper.name(),
            "Scraping career pages"
        );

        let rendered = join_all(pages.iter().map(|p| self.render_one(p))).await;

        let mut outcome = ScrapeOutcome::default();
        for (page, result) in pages.iter().zip(rendered) {
            match result {
                Ok(rendered) => {
                    outcome.pages_rendered += 1;
                    let found = extract_candidates(page, &rendered, &self.filter, Utc::now());
                    debug!(sponsor = %page.sponsor_name, url = %page.url, postings = found.len(), "Extracted postings");
                    outcome.candidates.extend(found);
                }
                Err(e) => {
                    outcome.pages_failed += 1;
                    warn!(sponsor = %page.sponsor_name, url = %page.url, error = %e, "Render failed");
                }
            }
        }

        info!(
            rendered = outcome.pages_rendered,
            failed = outcome.pages_failed,
            postings = outcome.candidates.len(),
            "Scrape complete"
        );
        outcome
    }
}
