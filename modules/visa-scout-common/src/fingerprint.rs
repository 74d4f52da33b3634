use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

/// Query parameters that identify a visitor or campaign rather than a posting.
const TRACKING_PARAMS: &[&str] = &[
    "_dt", "fbclid", "gclid", "modal", "ref", "mc_cid", "mc_eid", "gh_src", "trk", "source",
];

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

/// Normalize a posting link into the canonical form used for identity.
///
/// Relative links are resolved against `base`. The fragment, tracking parameters and any
/// trailing slash are removed. Returns `None` for links that do not resolve to http(s).
pub fn normalize_posting_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    let mut parsed = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    parsed.set_fragment(None);

    if parsed.query().is_some() {
        let clean_pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if clean_pairs.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(clean_pairs);
        }
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    let mut normalized = parsed.to_string();
    // Bare origin serializes with a "/" path.
    if parsed.query().is_none() && normalized.ends_with('/') {
        normalized.pop();
    }
    Some(normalized)
}

/// Stable identity of a real-world posting: hex SHA-256 over sponsor and normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PostingFingerprint(String);

impl PostingFingerprint {
    /// Wrap an already-computed fingerprint, e.g. one read back from the seen store.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostingFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn fingerprint(sponsor_name: &str, normalized_url: &str) -> PostingFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(sponsor_name.trim().to_lowercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(normalized_url.as_bytes());
    PostingFingerprint(hex::encode(hasher.finalize()))
}
