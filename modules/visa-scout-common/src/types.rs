use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::fingerprint::{fingerprint, PostingFingerprint};

// --- Sponsors ---

/// Visa route a sponsor is licensed for, as listed in the registry's route column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VisaRoute {
    SkilledWorker,
    GlobalBusinessMobility,
    ScaleUp,
    Other(String),
}

impl VisaRoute {
    /// Parse a single route label. Returns `None` for blank cells.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lower = trimmed.to_lowercase();
        let route = if lower.contains("skilled worker") || lower.contains("tier 2 general") {
            VisaRoute::SkilledWorker
        } else if lower.starts_with("global business mobility") {
            VisaRoute::GlobalBusinessMobility
        } else if lower.contains("scale-up") || lower.contains("scaleup") {
            VisaRoute::ScaleUp
        } else {
            VisaRoute::Other(trimmed.to_string())
        };
        Some(route)
    }

    /// Parse a route cell that may list several routes separated by `;` or `,`.
    pub fn parse_list(cell: &str) -> Vec<Self> {
        cell.split([';', ','])
            .filter_map(VisaRoute::parse)
            .collect()
    }

    pub fn label(&self) -> &str {
        match self {
            VisaRoute::SkilledWorker => "Skilled Worker",
            VisaRoute::GlobalBusinessMobility => "Global Business Mobility",
            VisaRoute::ScaleUp => "Scale-up",
            VisaRoute::Other(raw) => raw,
        }
    }
}

impl fmt::Display for VisaRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for VisaRoute {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// A licensed sponsor that survived filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorRecord {
    pub name: String,
    pub visa_route: VisaRoute,
    pub sector_tags: BTreeSet<String>,
    pub override_career_url: Option<String>,
    /// "Town, County" as listed in the registry, when present.
    pub location: Option<String>,
}

// --- Career pages ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedVia {
    Override,
    Search,
}

impl fmt::Display for ResolvedVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedVia::Override => write!(f, "override"),
            ResolvedVia::Search => write!(f, "search"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CareerPage {
    pub sponsor_name: String,
    pub url: String,
    pub resolved_via: ResolvedVia,
    /// True only when the liveness probe returned HTTP 200.
    pub validated: bool,
}

// --- Postings ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostingCandidate {
    pub sponsor_name: String,
    pub career_page_url: String,
    /// Normalized absolute URL. Basis of the fingerprint.
    pub url: String,
    pub title: String,
    pub extracted_at: DateTime<Utc>,
}

impl PostingCandidate {
    pub fn fingerprint(&self) -> PostingFingerprint {
        fingerprint(&self.sponsor_name, &self.url)
    }
}

// --- Resumes ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resume {
    pub id: String,
    pub text: String,
}

// --- Scores ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum VisaLikelihood {
    Low,
    Medium,
    High,
}

impl VisaLikelihood {
    /// Numeric mapping used by the composite rank: High > Medium > Low.
    pub fn weight(self) -> u32 {
        match self {
            VisaLikelihood::Low => 1,
            VisaLikelihood::Medium => 2,
            VisaLikelihood::High => 3,
        }
    }
}

impl fmt::Display for VisaLikelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VisaLikelihood::Low => "Low",
            VisaLikelihood::Medium => "Medium",
            VisaLikelihood::High => "High",
        };
        f.write_str(label)
    }
}

/// Outcome of scoring one posting against one resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreResult {
    /// 0..=10
    pub qa_relevance: u8,
    pub visa_likelihood: VisaLikelihood,
    /// 0..=100
    pub resume_match_score: u8,
    pub reason: String,
}

/// A posting with its best-matching resume.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPosting {
    pub posting: PostingCandidate,
    pub fingerprint: PostingFingerprint,
    pub resume_id: String,
    pub qa_relevance: u8,
    pub visa_likelihood: VisaLikelihood,
    pub resume_match_score: u8,
    pub reason: String,
    pub composite_rank: f64,
    /// Name of the strategy that produced the score.
    pub scored_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_parsing_recognizes_skilled_worker_variants() {
        assert_eq!(VisaRoute::parse("Skilled Worker"), Some(VisaRoute::SkilledWorker));
        assert_eq!(VisaRoute::parse(" skilled worker "), Some(VisaRoute::SkilledWorker));
        assert_eq!(VisaRoute::parse("Tier 2 General"), Some(VisaRoute::SkilledWorker));
        assert_eq!(VisaRoute::parse(""), None);
    }

    #[test]
    fn route_parsing_keeps_unknown_labels() {
        assert_eq!(
            VisaRoute::parse("Global Business Mobility: Senior or Specialist Worker"),
            Some(VisaRoute::GlobalBusinessMobility)
        );
        assert_eq!(VisaRoute::parse("Scale-up"), Some(VisaRoute::ScaleUp));
        assert_eq!(
            VisaRoute::parse("Seasonal Worker"),
            Some(VisaRoute::Other("Seasonal Worker".into()))
        );
    }

    #[test]
    fn route_list_splits_on_separators() {
        let routes = VisaRoute::parse_list("Skilled Worker; Scale-up, Seasonal Worker");
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0], VisaRoute::SkilledWorker);
    }

    #[test]
    fn visa_weight_orders_high_over_low() {
        assert!(VisaLikelihood::High.weight() > VisaLikelihood::Medium.weight());
        assert!(VisaLikelihood::Medium.weight() > VisaLikelihood::Low.weight());
    }

    #[test]
    fn visa_likelihood_serializes_as_capitalized_label() {
        let json = serde_json::to_string(&VisaLikelihood::Medium).unwrap();
        assert_eq!(json, "\"Medium\"");
        let parsed: VisaLikelihood = serde_json::from_str("\"High\"").unwrap();
        assert_eq!(parsed, VisaLikelihood::High);
        assert!(serde_json::from_str::<VisaLikelihood>("\"high\"").is_err());
    }
}
