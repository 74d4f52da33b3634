use std::collections::HashSet;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use visa_scout_common::{normalize_posting_url, CareerPage, PostingCandidate};

use crate::scraper::RenderedPage;

const ROLE_KEYWORDS: &[&str] = &[
    "qa",
    "quality assurance",
    "quality engineer",
    "sdet",
    "test engineer",
    "test automation",
    "automation engineer",
    "automation tester",
    "test analyst",
    "software tester",
    "qe",
    "quality manager",
];

const JUNIOR_MARKERS: &[&str] = &[
    "junior",
    "jr",
    "graduate",
    "grad",
    "intern",
    "internship",
    "placement",
    "apprentice",
    "apprenticeship",
    "trainee",
    "entry level",
];

const CONTRACT_MARKERS: &[&str] = &[
    "contract",
    "contractor",
    "fixed term",
    "ftc",
    "temporary",
    "temp",
    "freelance",
    "interim",
];

/// Any of these rescues a "manual" title from the manual-only exclusion.
const AUTOMATION_MARKERS: &[&str] = &[
    "automation",
    "automated",
    "sdet",
    "selenium",
    "playwright",
    "cypress",
    "scripting",
    "script",
    "python",
    "java",
    "javascript",
    "typescript",
    "code",
];

/// Hosts whose postings are reposts, not the sponsor's own listing.
const JOB_BOARD_HOSTS: &[&str] = &["linkedin.com", "indeed.com", "indeed.co.uk", "glassdoor.com", "glassdoor.co.uk"];

/// Case-insensitive whole-word alternation. Multi-word keywords also match with `-` or `_`
/// between the words.
fn keyword_regex(keywords: &[&str]) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|kw| {
            kw.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"[\s\-_]+")
        })
        .collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
}

/// Why a link was rejected by [`RoleFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotRole,
    Junior,
    Contract,
    ManualOnly,
}

/// Role inclusion and seniority/contract/manual exclusion rules.
pub struct RoleFilter {
    role: Regex,
    junior: Regex,
    contract: Regex,
    manual: Regex,
    automation: Regex,
}

impl RoleFilter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            role: keyword_regex(ROLE_KEYWORDS)?,
            junior: keyword_regex(JUNIOR_MARKERS)?,
            contract: keyword_regex(CONTRACT_MARKERS)?,
            manual: keyword_regex(&["manual"])?,
            automation: keyword_regex(AUTOMATION_MARKERS)?,
        })
    }

    /// Check a link's title together with the words of its href.
    pub fn check(&self, title: &str, href: &str) -> Result<(), Rejection> {
        let text = format!("{title} {}", href_words(href));

        if !self.role.is_match(&text) {
            return Err(Rejection::NotRole);
        }
        if self.junior.is_match(&text) {
            return Err(Rejection::Junior);
        }
        if self.contract.is_match(&text) {
            return Err(Rejection::Contract);
        }
        if self.manual.is_match(&text) && !self.automation.is_match(&text) {
            return Err(Rejection::ManualOnly);
        }
        Ok(())
    }

    pub fn accepts(&self, title: &str, href: &str) -> bool {
        self.check(title, href).is_ok()
    }
}

/// Path and query of a link as space-separated words. The host is left out so that
/// e.g. `qa.example.com` does not mark every link on it as a QA role.
fn href_words(href: &str) -> String {
    let tail = match Url::parse(href) {
        Ok(u) => format!("{} {}", u.path(), u.query().unwrap_or_default()),
        Err(_) => href.to_string(),
    };
    tail.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Last path segment with separators turned into spaces: `/jobs/senior-sdet` -> `senior sdet`.
fn title_from_slug(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
        .unwrap_or_default();
    collapse_whitespace(&segment.replace(['-', '_', '+'], " "))
}

fn is_job_board(url: &Url) -> bool {
    url.host_str().is_some_and(|h| {
        let h = h.to_lowercase();
        JOB_BOARD_HOSTS
            .iter()
            .any(|d| h == *d || h.ends_with(&format!(".{d}")))
    })
}

/// Extract role postings from a rendered career page.
///
/// Every `<a href>` is considered. Relative links resolve against the rendered page's
/// final URL. Candidates that share a normalized URL are emitted once.
/// Base for relative links: a `<base href>` in the document, resolved against
/// the URL the document was loaded from, else that URL itself.
fn document_base(document: &Html, loaded_from: &str, career_page_url: &str) -> Option<Url> {
    let loaded = Url::parse(loaded_from)
        .or_else(|_| Url::parse(career_page_url))
        .ok();
    let declared = Selector::parse("base[href]").ok().and_then(|selector| {
        let href = document.select(&selector).next()?.value().attr("href")?.trim();
        match loaded {
            Some(ref loaded) => loaded.join(href).ok(),
            None => Url::parse(href).ok(),
        }
    });
    declared
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .or(loaded)
}

pub fn extract_candidates(
    page: &CareerPage,
    rendered: &RenderedPage,
    filter: &RoleFilter,
    extracted_at: DateTime<Utc>,
) -> Vec<PostingCandidate> {
    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(&rendered.html);
    let base = document_base(&document, &rendered.url, &page.url);
    let self_url = normalize_posting_url(&page.url, None);

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for anchor in document.select(&anchor_selector) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        let lower = href.to_lowercase();
        if href.is_empty()
            || href.starts_with('#')
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
            || lower.starts_with("javascript:")
        {
            continue;
        }

        let Some(url) = normalize_posting_url(href, base.as_ref()) else {
            continue;
        };
        let Ok(parsed) = Url::parse(&url) else {
            continue;
        };
        if is_job_board(&parsed) || self_url.as_deref() == Some(url.as_str()) {
            continue;
        }

        let mut title = collapse_whitespace(&anchor.text().collect::<Vec<_>>().join(" "));
        if title.is_empty() {
            title = title_from_slug(&parsed);
        }
        if title.is_empty() || !filter.accepts(&title, &url) {
            continue;
        }

        if seen.insert(url.clone()) {
            candidates.push(PostingCandidate {
                sponsor_name: page.sponsor_name.clone(),
                career_page_url: page.url.clone(),
                url,
                title,
                extracted_at,
            });
        }
    }

    candidates
}
