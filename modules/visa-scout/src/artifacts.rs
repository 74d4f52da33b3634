use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use visa_scout_common::{CareerPage, PostingCandidate, ScoredPosting, SponsorRecord};

pub const SPONSORS_FILTERED: &str = "sponsors_filtered.csv";
pub const CAREER_PAGES: &str = "career_pages.csv";
pub const JOBS_RAW: &str = "jobs_raw.csv";
pub const JOBS_RANKED: &str = "jobs_ranked.csv";

/// A flat CSV row with a fixed header, written even when there are no rows.
pub trait ArtifactRow: Serialize {
    const HEADERS: &'static [&'static str];
}

#[derive(Debug, Serialize)]
pub struct SponsorRow<'a> {
    name: &'a str,
    visa_route: &'a str,
    sector_tags: String,
    override_career_url: &'a str,
    location: &'a str,
}

impl ArtifactRow for SponsorRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "name",
        "visa_route",
        "sector_tags",
        "override_career_url",
        "location",
    ];
}

impl<'a> From<&'a SponsorRecord> for SponsorRow<'a> {
    fn from(s: &'a SponsorRecord) -> Self {
        Self {
            name: &s.name,
            visa_route: s.visa_route.label(),
            sector_tags: s.sector_tags.iter().cloned().collect::<Vec<_>>().join("; "),
            override_career_url: s.override_career_url.as_deref().unwrap_or_default(),
            location: s.location.as_deref().unwrap_or_default(),
        }
    }
}

impl ArtifactRow for CareerPage {
    const HEADERS: &'static [&'static str] = &["sponsor_name", "url", "resolved_via", "validated"];
}

#[derive(Debug, Serialize)]
pub struct RawJobRow<'a> {
    sponsor_name: &'a str,
    career_page_url: &'a str,
    url: &'a str,
    title: &'a str,
    extracted_at: String,
    fingerprint: String,
}

impl ArtifactRow for RawJobRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "sponsor_name",
        "career_page_url",
        "url",
        "title",
        "extracted_at",
        "fingerprint",
    ];
}

impl<'a> From<&'a PostingCandidate> for RawJobRow<'a> {
    fn from(p: &'a PostingCandidate) -> Self {
        Self {
            sponsor_name: &p.sponsor_name,
            career_page_url: &p.career_page_url,
            url: &p.url,
            title: &p.title,
            extracted_at: p.extracted_at.to_rfc3339(),
            fingerprint: p.fingerprint().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RankedJobRow<'a> {
    rank: usize,
    sponsor_name: &'a str,
    title: &'a str,
    url: &'a str,
    resume_id: &'a str,
    resume_match_score: u8,
    qa_relevance: u8,
    visa_likelihood: String,
    composite_rank: f64,
    scored_by: &'a str,
    reason: &'a str,
    career_page_url: &'a str,
    fingerprint: &'a str,
}

impl ArtifactRow for RankedJobRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "rank",
        "sponsor_name",
        "title",
        "url",
        "resume_id",
        "resume_match_score",
        "qa_relevance",
        "visa_likelihood",
        "composite_rank",
        "scored_by",
        "reason",
        "career_page_url",
        "fingerprint",
    ];
}

impl<'a> RankedJobRow<'a> {
    fn new(rank: usize, s: &'a ScoredPosting) -> Self {
        Self {
            rank,
            sponsor_name: &s.posting.sponsor_name,
            title: &s.posting.title,
            url: &s.posting.url,
            resume_id: &s.resume_id,
            resume_match_score: s.resume_match_score,
            qa_relevance: s.qa_relevance,
            visa_likelihood: s.visa_likelihood.to_string(),
            composite_rank: s.composite_rank,
            scored_by: &s.scored_by,
            reason: &s.reason,
            career_page_url: &s.posting.career_page_url,
            fingerprint: s.fingerprint.as_str(),
        }
    }
}

pub fn write_csv<T: ArtifactRow>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(T::HEADERS)?;
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = count, "Wrote artifact");
    Ok(count)
}

/// Writes the run's CSV artifacts into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create artifact directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sponsors(&self, sponsors: &[SponsorRecord]) -> Result<usize> {
        write_csv(
            &self.dir.join(SPONSORS_FILTERED),
            sponsors.iter().map(SponsorRow::from),
        )
    }

    pub fn career_pages(&self, pages: &[CareerPage]) -> Result<usize> {
        write_csv(&self.dir.join(CAREER_PAGES), pages.iter().cloned())
    }

    pub fn raw_jobs(&self, postings: &[PostingCandidate]) -> Result<usize> {
        write_csv(&self.dir.join(JOBS_RAW), postings.iter().map(RawJobRow::from))
    }

    pub fn ranked_jobs(&self, ranked: &[ScoredPosting]) -> Result<usize> {
        write_csv(
            &self.dir.join(JOBS_RANKED),
            ranked
                .iter()
                .enumerate()
                .map(|(i, s)| RankedJobRow::new(i + 1, s)),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use visa_scout_common::{ResolvedVia, VisaRoute};

    use super::*;

    #[test]
    fn empty_artifact_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        assert_eq!(writer.ranked_jobs(&[]).unwrap(), 0);

        let raw = std::fs::read_to_string(dir.path().join(JOBS_RANKED)).unwrap();
        assert_eq!(raw.lines().count(), 1);
        assert!(raw.starts_with("rank,sponsor_name,title,url"));
    }

    #[test]
    fn writes_sponsor_and_career_page_rows() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("out")).unwrap();

        let sponsor = SponsorRecord {
            name: "Acme, Ltd".to_string(),
            visa_route: VisaRoute::SkilledWorker,
            sector_tags: BTreeSet::from(["software".to_string(), "data".to_string()]),
            override_career_url: None,
            location: Some("London".to_string()),
        };
        writer.sponsors(&[sponsor]).unwrap();
        let raw = std::fs::read_to_string(writer.dir().join(SPONSORS_FILTERED)).unwrap();
        assert!(raw.contains("\"Acme, Ltd\",Skilled Worker,data; software,,London"));

        let page = CareerPage {
            sponsor_name: "Acme".to_string(),
            url: "https://acme.example/careers".to_string(),
            resolved_via: ResolvedVia::Override,
            validated: true,
        };
        writer.career_pages(&[page]).unwrap();
        let raw = std::fs::read_to_string(writer.dir().join(CAREER_PAGES)).unwrap();
        assert!(raw.contains("Acme,https://acme.example/careers,override,true"));
    }

    #[test]
    fn raw_jobs_carry_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        let posting = PostingCandidate {
            sponsor_name: "Acme".to_string(),
            career_page_url: "https://acme.example/careers".to_string(),
            url: "https://acme.example/jobs/1".to_string(),
            title: "QA Engineer".to_string(),
            extracted_at: Utc::now(),
        };
        writer.raw_jobs(&[posting.clone()]).unwrap();
        let raw = std::fs::read_to_string(dir.path().join(JOBS_RAW)).unwrap();
        assert!(raw.contains(posting.fingerprint().as_str()));
    }
}
