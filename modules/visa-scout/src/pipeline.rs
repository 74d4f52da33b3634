use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use visa_scout_common::{Config, PostingCandidate, PostingFingerprint, Resume, ScoredPosting};

use crate::artifacts::ArtifactWriter;
use crate::pool::WorkerPool;
use crate::postings::RoleFilter;
use crate::resolver::{CareerPageResolver, LivenessProbe};
use crate::scoring::{rank_and_cap, ScoringEngine, ScoringStrategy};
use crate::scraper::{PageScraper, PostingScraper};
use crate::search::WebSearcher;
use crate::seen_store::SeenStore;
use crate::sponsors::SponsorRegistry;

/// Counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub sponsors_in_registry: usize,
    pub sponsors_filtered: usize,
    pub career_pages_resolved: usize,
    pub sponsors_unresolved: usize,
    pub pages_rendered: usize,
    pub pages_failed: usize,
    pub postings_scraped: usize,
    pub duplicates_prior_runs: usize,
    pub duplicates_in_run: usize,
    pub new_postings: usize,
    pub pairs_scored: usize,
    pub pairs_failed: usize,
    pub postings_scored: usize,
    pub postings_output: usize,
    pub fingerprints_recorded: usize,
    pub seen_store_size: usize,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Visa Scout Run Complete ===")?;
        writeln!(f, "Sponsors in registry:   {}", self.sponsors_in_registry)?;
        writeln!(f, "Sponsors filtered:      {}", self.sponsors_filtered)?;
        writeln!(f, "Career pages resolved:  {}", self.career_pages_resolved)?;
        writeln!(f, "Sponsors unresolved:    {}", self.sponsors_unresolved)?;
        writeln!(f, "Pages rendered:         {}", self.pages_rendered)?;
        writeln!(f, "Pages failed:           {}", self.pages_failed)?;
        writeln!(f, "Postings scraped:       {}", self.postings_scraped)?;
        writeln!(
            f,
            "Duplicates:             {} ({} prior runs, {} within run)",
            self.duplicates_prior_runs + self.duplicates_in_run,
            self.duplicates_prior_runs,
            self.duplicates_in_run
        )?;
        writeln!(f, "New postings:           {}", self.new_postings)?;
        writeln!(
            f,
            "Pairs scored:           {} ({} failed)",
            self.pairs_scored, self.pairs_failed
        )?;
        writeln!(f, "Postings scored:        {}", self.postings_scored)?;
        writeln!(f, "Postings output:        {}", self.postings_output)?;
        writeln!(f, "Fingerprints recorded:  {}", self.fingerprints_recorded)?;
        writeln!(f, "Seen store size:        {}", self.seen_store_size)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    /// Ranked and capped, best first.
    pub ranked: Vec<ScoredPosting>,
    pub stats: RunStats,
}

/// Per-run limits taken from [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub max_companies: usize,
    pub daily_job_limit: usize,
    pub min_resume_match: u8,
}

impl From<&Config> for RunLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_companies: config.max_companies,
            daily_job_limit: config.daily_job_limit,
            min_resume_match: config.min_resume_match,
        }
    }
}

/// Drop postings already seen in a prior run or earlier in this run.
///
/// Returns the survivors and the `(prior, in_run)` duplicate counts.
pub fn dedupe(
    candidates: Vec<PostingCandidate>,
    seen: &dyn SeenStore,
) -> (Vec<PostingCandidate>, usize, usize) {
    let mut this_run: HashSet<PostingFingerprint> = HashSet::new();
    let mut prior = 0;
    let mut in_run = 0;
    let mut fresh = Vec::new();

    for candidate in candidates {
        let fp = candidate.fingerprint();
        if seen.has(&fp) {
            prior += 1;
            debug!(url = %candidate.url, "Seen in a prior run");
        } else if !this_run.insert(fp) {
            in_run += 1;
        } else {
            fresh.push(candidate);
        }
    }
    (fresh, prior, in_run)
}

/// Sponsor registry in, ranked postings out.
pub struct Pipeline {
    resolver: CareerPageResolver,
    scraper: PostingScraper,
    scoring: ScoringEngine,
    seen: Box<dyn SeenStore>,
    artifacts: Option<ArtifactWriter>,
    limits: RunLimits,
}

impl Pipeline {
    pub fn new(
        resolver: CareerPageResolver,
        scraper: PostingScraper,
        scoring: ScoringEngine,
        seen: Box<dyn SeenStore>,
        artifacts: Option<ArtifactWriter>,
        limits: RunLimits,
    ) -> Self {
        Self {
            resolver,
            scraper,
            scoring,
            seen,
            artifacts,
            limits,
        }
    }

    /// Wire every stage from config around the given boundaries.
    pub fn from_config(
        config: &Config,
        searcher: Arc<dyn WebSearcher>,
        probe: Arc<dyn LivenessProbe>,
        page_scraper: Arc<dyn PageScraper>,
        strategy: Arc<dyn ScoringStrategy>,
        seen: Box<dyn SeenStore>,
    ) -> Result<Self> {
        let resolver = CareerPageResolver::new(
            searcher,
            probe,
            WorkerPool::new("probe", config.concurrent_browsers),
            config.search_batch_size,
            config.search_result_limit,
        );
        let scraper = PostingScraper::new(
            page_scraper,
            WorkerPool::new("render", config.concurrent_browsers),
            RoleFilter::new().context("Invalid role keyword pattern")?,
            config.render_timeout,
        );
        let scoring = ScoringEngine::new(strategy, config.scoring_concurrency);
        let artifacts = ArtifactWriter::new(config.data_dir())?;

        Ok(Self::new(
            resolver,
            scraper,
            scoring,
            seen,
            Some(artifacts),
            RunLimits::from(config),
        ))
    }

    pub fn seen_store(&self) -> &dyn SeenStore {
        self.seen.as_ref()
    }

    fn write_artifact(&self, name: &str, write: impl FnOnce(&ArtifactWriter) -> Result<usize>) {
        if let Some(ref artifacts) = self.artifacts {
            if let Err(e) = write(artifacts) {
                warn!(artifact = name, error = %e, "Failed to write artifact");
            }
        }
    }

    pub async fn run(
        &mut self,
        registry: &SponsorRegistry,
        overrides: &HashMap<String, String>,
        resumes: Arc<[Resume]>,
    ) -> Result<RunOutcome> {
        let mut stats = RunStats {
            sponsors_in_registry: registry.len(),
            ..Default::default()
        };

        // A corrupt store aborts before any network activity.
        self.seen.load().await?;

        let sponsors = registry.filter(overrides, self.limits.max_companies);
        stats.sponsors_filtered = sponsors.len();
        self.write_artifact("sponsors", |a| a.sponsors(&sponsors));

        let resolved = self.resolver.resolve_all(&sponsors).await;
        stats.career_pages_resolved = resolved.pages.len();
        stats.sponsors_unresolved = resolved.unresolved;
        self.write_artifact("career_pages", |a| a.career_pages(&resolved.pages));

        let scraped = self.scraper.scrape_all(&resolved.pages).await;
        stats.pages_rendered = scraped.pages_rendered;
        stats.pages_failed = scraped.pages_failed;
        stats.postings_scraped = scraped.candidates.len();
        self.write_artifact("jobs_raw", |a| a.raw_jobs(&scraped.candidates));

        let (fresh, prior, in_run) = dedupe(scraped.candidates, self.seen.as_ref());
        stats.duplicates_prior_runs = prior;
        stats.duplicates_in_run = in_run;
        stats.new_postings = fresh.len();
        info!(new = fresh.len(), prior, in_run, "Deduplication complete");

        let scoring = self.scoring.score_all(fresh, resumes).await;
        stats.pairs_scored = scoring.pairs_scored;
        stats.pairs_failed = scoring.pairs_failed;
        stats.postings_scored = scoring.scored.len();

        // Everything scored counts as seen, including postings the cap drops.
        let fingerprints: Vec<PostingFingerprint> = scoring
            .scored
            .iter()
            .map(|s| s.fingerprint.clone())
            .collect();
        stats.fingerprints_recorded = self.seen.record_all(&fingerprints, Utc::now()).len();
        stats.seen_store_size = self.seen.len();

        let ranked = rank_and_cap(
            scoring.scored,
            self.limits.daily_job_limit,
            self.limits.min_resume_match,
        );
        stats.postings_output = ranked.len();
        self.write_artifact("jobs_ranked", |a| a.ranked_jobs(&ranked));

        self.seen
            .save()
            .await
            .context("Failed to save seen store")?;

        info!(
            output = stats.postings_output,
            recorded = stats.fingerprints_recorded,
            "Run complete"
        );
        Ok(RunOutcome { ranked, stats })
    }
}
