use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};
use url::Url;

use visa_scout_common::{CareerPage, ResolvedVia, SponsorRecord};

use crate::pool::WorkerPool;
use crate::search::{WebSearcher, USER_AGENT};

/// Job boards and hosted applicant-tracking systems. Never a sponsor's own career page.
const AGGREGATOR_HOSTS: &[&str] = &[
    "linkedin.com",
    "indeed.com",
    "indeed.co.uk",
    "glassdoor.com",
    "glassdoor.co.uk",
    "lever.co",
    "greenhouse.io",
    "myworkdayjobs.com",
    "workday.com",
    "workdayjobs.com",
    "smartrecruiters.com",
    "jobvite.com",
    "icims.com",
    "totaljobs.com",
    "reed.co.uk",
    "cv-library.co.uk",
];

/// Name tokens that say nothing about which domain a company owns.
const FILLER_TOKENS: &[&str] = &[
    "ltd",
    "limited",
    "plc",
    "llp",
    "llc",
    "inc",
    "uk",
    "group",
    "holdings",
    "the",
    "and",
    "co",
    "company",
    "europe",
    "international",
];

const SAFE_MODE_SUFFIXES: &[&str] = &[" ltd", " limited", " europe", " uk"];

fn host_is_listed(host: &str, listed: &[&str]) -> bool {
    let host = host.to_lowercase();
    listed
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

pub fn is_aggregator(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| host_is_listed(h, AGGREGATOR_HOSTS)))
        .unwrap_or(false)
}

fn name_tokens(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !FILLER_TOKENS.contains(t))
        .map(String::from)
        .collect()
}

/// Whether a result host plausibly belongs to the named sponsor.
pub fn host_matches_sponsor(host: &str, sponsor_name: &str) -> bool {
    let tokens = name_tokens(sponsor_name);
    let Some(first) = tokens.first() else {
        return false;
    };
    let compact: String = host
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();

    compact.contains(&tokens.concat()) || (first.len() >= 3 && compact.contains(first.as_str()))
}

/// Sponsor name with a trailing legal/region suffix removed, if it has one.
pub fn safe_mode_variant(name: &str) -> Option<String> {
    let name = name.trim();
    SAFE_MODE_SUFFIXES.iter().find_map(|suffix| {
        // Suffixes are ASCII: match on `name` itself so the cut is a char boundary.
        let cut = name.len().checked_sub(suffix.len())?;
        let tail = name.get(cut..)?;
        if !tail.eq_ignore_ascii_case(suffix) {
            return None;
        }
        let trimmed = name.get(..cut)?.trim_matches([' ', ',', '.', '-']);
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

// --- LivenessProbe trait ---

/// Where a liveness check ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTP status after redirects.
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
}

#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeResponse>;
}

pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()
                .context("Failed to build probe HTTP client")?,
        })
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<ProbeResponse> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Probe request failed for {url}"))?;
        Ok(ProbeResponse {
            status: resp.status().as_u16(),
            final_url: resp.url().to_string(),
        })
    }
}

// --- Resolver ---

#[derive(Debug, thiserror::Error)]
pub enum ResolveFailure {
    #[error("search failed: {0:#}")]
    Search(anyhow::Error),
    #[error("no search result matched the sponsor")]
    NoMatch,
    #[error("probe returned HTTP {0}")]
    Status(u16),
    #[error("probe failed: {0:#}")]
    Probe(anyhow::Error),
}

#[derive(Debug, Default)]
pub struct ResolveOutcome {
    /// Validated pages, in worklist order.
    pub pages: Vec<CareerPage>,
    pub unresolved: usize,
}

pub struct CareerPageResolver {
    searcher: Arc<dyn WebSearcher>,
    probe: Arc<dyn LivenessProbe>,
    pool: WorkerPool,
    batch_size: usize,
    result_limit: usize,
}

impl CareerPageResolver {
    pub fn new(
        searcher: Arc<dyn WebSearcher>,
        probe: Arc<dyn LivenessProbe>,
        pool: WorkerPool,
        batch_size: usize,
        result_limit: usize,
    ) -> Self {
        Self {
            searcher,
            probe,
            pool,
            batch_size: batch_size.max(1),
            result_limit: result_limit.max(1),
        }
    }

    pub async fn resolve_all(&self, sponsors: &[SponsorRecord]) -> ResolveOutcome {
        let mut outcome = ResolveOutcome::default();

        for (batch_no, batch) in sponsors.chunks(self.batch_size).enumerate() {
            debug!(batch = batch_no, size = batch.len(), "Resolving career page batch");
            let results = join_all(batch.iter().map(|s| self.resolve_one(s))).await;

            for (sponsor, result) in batch.iter().zip(results) {
                match result {
                    Ok(page) => {
                        debug!(sponsor = %sponsor.name, url = %page.url, via = %page.resolved_via, "Career page resolved");
                        outcome.pages.push(page);
                    }
                    Err(e) => {
                        warn!(sponsor = %sponsor.name, error = %e, "Career page unresolved");
                        outcome.unresolved += 1;
                    }
                }
            }
        }

        info!(
            resolved = outcome.pages.len(),
            unresolved = outcome.unresolved,
            "Career page resolution complete"
        );
        outcome
    }

    pub async fn resolve_one(
        &self,
        sponsor: &SponsorRecord,
    ) -> Result<CareerPage, ResolveFailure> {
        let (url, resolved_via) = match sponsor.override_career_url {
            Some(ref url) => (url.clone(), ResolvedVia::Override),
            None => (self.search_for(&sponsor.name).await?, ResolvedVia::Search),
        };

        let response = self
            .pool
            .run(self.probe.probe(&url))
            .await
            .map_err(ResolveFailure::Probe)?
            .map_err(ResolveFailure::Probe)?;
        if response.status != 200 {
            return Err(ResolveFailure::Status(response.status));
        }
        if response.final_url != url {
            debug!(sponsor = %sponsor.name, from = %url, to = %response.final_url, "Career page redirected");
        }

        Ok(CareerPage {
            sponsor_name: sponsor.name.clone(),
            url: response.final_url,
            resolved_via,
            validated: true,
        })
    }

    async fn search_for(&self, name: &str) -> Result<String, ResolveFailure> {
        if let Some(url) = self.search_once(name).await? {
            return Ok(url);
        }
        if let Some(trimmed) = safe_mode_variant(name) {
            debug!(sponsor = name, variant = %trimmed, "Safe-mode search retry");
            if let Some(url) = self.search_once(&trimmed).await? {
                return Ok(url);
            }
        }
        Err(ResolveFailure::NoMatch)
    }

    /// First non-aggregator result whose host belongs to `name`.
    async fn search_once(&self, name: &str) -> Result<Option<String>, ResolveFailure> {
        let query = format!("{name} careers");
        let results = self
            .searcher
            .search(&query, self.result_limit)
            .await
            .map_err(ResolveFailure::Search)?;

        let found = results
            .into_iter()
            .take(self.result_limit)
            .filter(|r| !is_aggregator(&r.url))
            .find(|r| {
                Url::parse(&r.url)
                    .ok()
                    .filter(|u| matches!(u.scheme(), "http" | "https"))
                    .and_then(|u| u.host_str().map(|h| host_matches_sponsor(h, name)))
                    .unwrap_or(false)
            })
            .map(|r| r.url);
        Ok(found)
    }
}
