use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;

use visa_scout_common::{PostingCandidate, Resume, ScoreResult, VisaLikelihood};

use super::ScoringStrategy;

/// Skills that signal an automation-capable QA profile.
const SKILL_KEYWORDS: &[&str] = &[
    "automation",
    "selenium",
    "playwright",
    "cypress",
    "python",
    "pytest",
    "sdet",
    "qa",
    "java",
    "typescript",
    "javascript",
    "appium",
    "postman",
    "jmeter",
    "cucumber",
    "bdd",
    "api",
    "ci",
];

const ROLE_TITLE_TERMS: &[&str] = &["qa", "sdet", "automation", "test", "quality", "qe"];

/// Posting words too generic to count as overlap.
const STOPWORDS: &[&str] = &[
    "and", "the", "for", "with", "jobs", "job", "careers", "career", "apply", "senior", "lead",
    "http", "https", "www", "com", "html", "uk",
];

const NO_SPONSORSHIP_MARKERS: &[&str] = &["no sponsorship", "no visa", "without sponsorship"];

fn words(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Deterministic keyword-overlap scorer. Makes no network calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, posting: &PostingCandidate, resume: &Resume) -> ScoreResult {
        let resume_words = words(&resume.text);
        let title_words = words(&posting.title);
        let posting_words: BTreeSet<String> = title_words
            .iter()
            .cloned()
            .chain(words(&posting.url))
            .collect();

        let skills: Vec<&str> = SKILL_KEYWORDS
            .iter()
            .copied()
            .filter(|kw| resume_words.contains(*kw))
            .collect();
        let shared_terms = posting_words
            .iter()
            .filter(|w| w.len() >= 3 && !STOPWORDS.contains(&w.as_str()))
            .filter(|w| resume_words.contains(*w))
            .count();
        let role_hits = ROLE_TITLE_TERMS
            .iter()
            .filter(|t| title_words.contains(**t))
            .count();

        let qa_relevance = (skills.len() + 2 * role_hits).min(10) as u8;
        let resume_match_score = (40 + 8 * skills.len() + 5 * shared_terms).min(100) as u8;

        let lower_title = posting.title.to_lowercase();
        let visa_likelihood = if NO_SPONSORSHIP_MARKERS.iter().any(|m| lower_title.contains(m)) {
            VisaLikelihood::Low
        } else {
            VisaLikelihood::High
        };

        let reason = if skills.is_empty() {
            "Keyword heuristic: no shared automation skills.".to_string()
        } else {
            format!("Keyword heuristic: shared skills {}.", skills.join(", "))
        };

        ScoreResult {
            qa_relevance,
            visa_likelihood,
            resume_match_score,
            reason,
        }
    }
}

#[async_trait]
impl ScoringStrategy for HeuristicScorer {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn score(&self, posting: &PostingCandidate, resume: &Resume) -> Result<ScoreResult> {
        Ok(self.evaluate(posting, resume))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn posting(title: &str) -> PostingCandidate {
        PostingCandidate {
            sponsor_name: "Acme".to_string(),
            career_page_url: "https://acme.example/careers".to_string(),
            url: "https://acme.example/jobs/playwright-sdet".to_string(),
            title: title.to_string(),
            extracted_at: Utc::now(),
        }
    }

    fn resume(text: &str) -> Resume {
        Resume {
            id: "r.txt".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn is_deterministic_and_in_range() {
        let scorer = HeuristicScorer::new();
        let p = posting("Senior SDET - Playwright");
        let r = resume("SDET with Playwright, Python, pytest, Selenium, Cypress, Java, API testing, CI");
        let a = scorer.evaluate(&p, &r);
        let b = scorer.evaluate(&p, &r);
        assert_eq!(a, b);
        assert!(a.qa_relevance <= 10);
        assert!(a.resume_match_score <= 100);
        assert!(!a.reason.is_empty());
        assert!(a.reason.lines().count() <= 2);
    }

    #[test]
    fn stronger_resume_scores_higher() {
        let scorer = HeuristicScorer::new();
        let p = posting("QA Automation Engineer");
        let strong = scorer.evaluate(&p, &resume("QA automation with Selenium, Playwright and Python"));
        let weak = scorer.evaluate(&p, &resume("Barista and shift supervisor"));
        assert!(strong.resume_match_score > weak.resume_match_score);
        assert_eq!(weak.resume_match_score, 40);
    }

    #[test]
    fn no_sponsorship_lowers_visa_likelihood() {
        let scorer = HeuristicScorer::new();
        let r = resume("qa");
        assert_eq!(
            scorer.evaluate(&posting("QA Engineer (no sponsorship)"), &r).visa_likelihood,
            VisaLikelihood::Low
        );
        assert_eq!(
            scorer.evaluate(&posting("QA Engineer"), &r).visa_likelihood,
            VisaLikelihood::High
        );
    }
}
