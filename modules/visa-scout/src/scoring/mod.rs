pub mod heuristic;
pub mod llm;

pub use heuristic::HeuristicScorer;
pub use llm::{LlmAdapter, LlmScorer, OpenAiAdapter};

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use visa_scout_common::{PostingCandidate, Resume, ScoreResult, ScoredPosting};

// --- ScoringStrategy trait ---

#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    /// Recorded on each [`ScoredPosting`] as `scored_by`.
    fn name(&self) -> &str;

    async fn score(&self, posting: &PostingCandidate, resume: &Resume) -> Result<ScoreResult>;
}

/// LLM scoring when an adapter is available, otherwise the keyword heuristic.
pub fn select_strategy(llm: Option<Arc<dyn LlmAdapter>>) -> Arc<dyn ScoringStrategy> {
    match llm {
        Some(adapter) => Arc::new(LlmScorer::new(adapter)),
        None => {
            info!("LLM unavailable, scoring with keyword heuristic");
            Arc::new(HeuristicScorer::new())
        }
    }
}

/// Best-match order: higher resume match, then higher QA relevance, then earlier resume.
///
/// `Ordering::Less` means `a` ranks ahead of `b`.
pub fn compare_matches(a: &(usize, ScoreResult), b: &(usize, ScoreResult)) -> Ordering {
    b.1.resume_match_score
        .cmp(&a.1.resume_match_score)
        .then_with(|| b.1.qa_relevance.cmp(&a.1.qa_relevance))
        .then_with(|| a.0.cmp(&b.0))
}

/// Pick the best `(resume_index, score)` pair.
pub fn select_best(results: Vec<(usize, ScoreResult)>) -> Option<(usize, ScoreResult)> {
    results.into_iter().min_by(compare_matches)
}

pub fn composite_rank(score: &ScoreResult) -> f64 {
    f64::from(score.resume_match_score)
        + 4.0 * f64::from(score.qa_relevance)
        + 10.0 * f64::from(score.visa_likelihood.weight())
}

/// Sort by composite rank (descending, fingerprint ascending on ties), drop winners below
/// `min_resume_match`, then keep the first `limit`.
pub fn rank_and_cap(
    mut scored: Vec<ScoredPosting>,
    limit: usize,
    min_resume_match: u8,
) -> Vec<ScoredPosting> {
    scored.retain(|s| s.resume_match_score >= min_resume_match);
    scored.sort_by(|a, b| {
        b.composite_rank
            .total_cmp(&a.composite_rank)
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });
    scored.truncate(limit);
    scored
}

#[derive(Debug, Default)]
pub struct ScoringOutcome {
    /// One entry per posting with at least one successful pair, in input order.
    pub scored: Vec<ScoredPosting>,
    pub pairs_scored: usize,
    pub pairs_failed: usize,
}

/// Scores postings against every resume through one strategy.
pub struct ScoringEngine {
    strategy: Arc<dyn ScoringStrategy>,
    concurrency: usize,
}

impl ScoringEngine {
    pub fn new(strategy: Arc<dyn ScoringStrategy>, concurrency: usize) -> Self {
        info!(strategy = strategy.name(), concurrency, "Scoring engine ready");
        Self {
            strategy,
            concurrency: concurrency.max(1),
        }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    async fn score_posting(
        &self,
        posting: PostingCandidate,
        resumes: &[Resume],
    ) -> (Option<ScoredPosting>, usize, usize) {
        let mut results = Vec::with_capacity(resumes.len());
        let mut failed = 0;

        for (idx, resume) in resumes.iter().enumerate() {
            match self.strategy.score(&posting, resume).await {
                Ok(score) => results.push((idx, score)),
                Err(e) => {
                    failed += 1;
                    warn!(
                        posting = %posting.url,
                        resume = %resume.id,
                        error = %e,
                        "Scoring failed for pair"
                    );
                }
            }
        }
        let succeeded = results.len();

        let scored = select_best(results).map(|(idx, score)| {
            debug!(posting = %posting.url, resume = %resumes[idx].id, match_score = score.resume_match_score, "Best resume selected");
            ScoredPosting {
                fingerprint: posting.fingerprint(),
                resume_id: resumes[idx].id.clone(),
                qa_relevance: score.qa_relevance,
                visa_likelihood: score.visa_likelihood,
                resume_match_score: score.resume_match_score,
                composite_rank: composite_rank(&score),
                reason: score.reason,
                scored_by: self.strategy.name().to_string(),
                posting,
            }
        });

        (scored, succeeded, failed)
    }

    pub async fn score_all(
        &self,
        postings: Vec<PostingCandidate>,
        resumes: Arc<[Resume]>,
    ) -> ScoringOutcome {
        let total = postings.len();
        info!(postings = total, resumes = resumes.len(), strategy = self.strategy.name(), "Scoring postings");

        let mut results: Vec<(usize, (Option<ScoredPosting>, usize, usize))> =
            stream::iter(postings.into_iter().enumerate())
                .map(|(i, posting)| {
                    let resumes = resumes.clone();
                    async move { (i, self.score_posting(posting, &resumes).await) }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        results.sort_by_key(|(i, _)| *i);

        let mut outcome = ScoringOutcome::default();
        for (_, (scored, ok, failed)) in results {
            outcome.pairs_scored += ok;
            outcome.pairs_failed += failed;
            outcome.scored.extend(scored);
        }

        info!(
            postings = total,
            scored = outcome.scored.len(),
            pairs_scored = outcome.pairs_scored,
            pairs_failed = outcome.pairs_failed,
            "Scoring complete"
        );
        outcome
    }
}
