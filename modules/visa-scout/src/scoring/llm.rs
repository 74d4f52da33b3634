use std::sync::Arc;

use ai_client::{strip_code_blocks, truncate_to_char_boundary, OpenAi, StructuredOutput};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use visa_scout_common::{PostingCandidate, Resume, ScoreResult, VisaLikelihood};

use super::ScoringStrategy;

/// Resume text sent to the model is cut to this many bytes.
pub const RESUME_EXCERPT_BYTES: usize = 3000;

const SYSTEM_PROMPT: &str = "\
You assess job postings for a candidate seeking a UK Skilled Worker visa sponsored role in \
QA, SDET or test automation. The employer is a licensed Skilled Worker sponsor.

Score the posting against the resume excerpt:
- qa_relevance: 0-10, how squarely the role is QA / SDET / automation / QE / QA management.
- visa_likelihood: Low, Medium or High, how likely this role is to be sponsored.
- resume_match_score: 0-100, how well the resume fits the role.
- reason: at most two short lines explaining the scores.

Junior, graduate, intern, contract and manual-only roles deserve low scores.";

// --- LlmAdapter trait ---

/// Raw completion boundary. Returns the model's text verbatim.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Wire shape the model must return. Unknown fields are rejected.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LlmScore {
    /// Integer 0-10.
    pub qa_relevance: i64,
    pub visa_likelihood: VisaLikelihood,
    /// Integer 0-100.
    pub resume_match_score: i64,
    /// At most two lines.
    pub reason: String,
}

/// Chat completions with a strict `json_schema` response format built from [`LlmScore`].
pub struct OpenAiAdapter {
    ai: OpenAi,
}

impl OpenAiAdapter {
    pub fn new(ai: OpenAi) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let raw = self
            .ai
            .structured_output("posting_score", LlmScore::strict_schema(), system, user)
            .await
            .context("OpenAI scoring request failed")?;
        Ok(raw)
    }
}

/// Parse and validate a model response. Code fences around the JSON are tolerated.
pub fn parse_score(raw: &str) -> Result<ScoreResult> {
    let parsed: LlmScore = serde_json::from_str(strip_code_blocks(raw))
        .context("LLM response is not a valid score object")?;

    if !(0..=10).contains(&parsed.qa_relevance) {
        bail!("qa_relevance out of range: {}", parsed.qa_relevance);
    }
    if !(0..=100).contains(&parsed.resume_match_score) {
        bail!("resume_match_score out of range: {}", parsed.resume_match_score);
    }
    let reason = parsed.reason.trim();
    if reason.is_empty() {
        bail!("reason is empty");
    }
    let lines = reason.lines().count();
    if lines > 2 {
        bail!("reason has {lines} lines, expected at most 2");
    }

    Ok(ScoreResult {
        qa_relevance: parsed.qa_relevance as u8,
        visa_likelihood: parsed.visa_likelihood,
        resume_match_score: parsed.resume_match_score as u8,
        reason: reason.to_string(),
    })
}

fn user_prompt(posting: &PostingCandidate, resume: &Resume) -> String {
    format!(
        "Title: {title}\nCompany: {company}\nPosting URL: {url}\nCareer page: {career}\n\n\
Resume ({resume_id}):\n{excerpt}",
        title = posting.title,
        company = posting.sponsor_name,
        url = posting.url,
        career = posting.career_page_url,
        resume_id = resume.id,
        excerpt = truncate_to_char_boundary(&resume.text, RESUME_EXCERPT_BYTES),
    )
}

/// Scores (posting, resume) pairs through an [`LlmAdapter`].
pub struct LlmScorer {
    adapter: Arc<dyn LlmAdapter>,
}

impl LlmScorer {
    pub fn new(adapter: Arc<dyn LlmAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ScoringStrategy for LlmScorer {
    fn name(&self) -> &str {
        "llm"
    }

    async fn score(&self, posting: &PostingCandidate, resume: &Resume) -> Result<ScoreResult> {
        let raw = self
            .adapter
            .complete(SYSTEM_PROMPT, &user_prompt(posting, resume))
            .await?;
        parse_score(&raw)
    }
}
