use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use visa_scout_common::{PostingFingerprint, ScoutError};

/// Cross-run set of posting fingerprints with first-seen timestamps.
///
/// Entries are never removed and an existing entry's timestamp never changes.
#[async_trait]
pub trait SeenStore: Send + Sync {
    async fn load(&mut self) -> Result<(), ScoutError>;

    fn has(&self, fingerprint: &PostingFingerprint) -> bool;

    /// Record fingerprints as seen at `at`. Returns those that were not already present.
    fn record_all(
        &mut self,
        fingerprints: &[PostingFingerprint],
        at: DateTime<Utc>,
    ) -> Vec<PostingFingerprint>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn save(&self) -> Result<(), ScoutError>;
}

fn insert_new(
    entries: &mut BTreeMap<PostingFingerprint, DateTime<Utc>>,
    fingerprints: &[PostingFingerprint],
    at: DateTime<Utc>,
) -> Vec<PostingFingerprint> {
    let mut inserted = Vec::new();
    for fp in fingerprints {
        if !entries.contains_key(fp) {
            entries.insert(fp.clone(), at);
            inserted.push(fp.clone());
        }
    }
    inserted
}

// --- JSON file ---

/// Seen store persisted as a JSON object `{fingerprint: rfc3339}` with sorted keys.
pub struct JsonFileSeenStore {
    path: PathBuf,
    entries: BTreeMap<PostingFingerprint, DateTime<Utc>>,
}

impl JsonFileSeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn first_seen(&self, fingerprint: &PostingFingerprint) -> Option<DateTime<Utc>> {
        self.entries.get(fingerprint).copied()
    }
}

#[async_trait]
impl SeenStore for JsonFileSeenStore {
    async fn load(&mut self) -> Result<(), ScoutError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No seen store yet, starting empty");
                self.entries.clear();
                return Ok(());
            }
            Err(e) => {
                return Err(ScoutError::SeenStore(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let parsed: BTreeMap<String, DateTime<Utc>> = serde_json::from_str(&raw).map_err(|e| {
            ScoutError::SeenStore(format!("corrupt seen store {}: {e}", self.path.display()))
        })?;
        self.entries = parsed
            .into_iter()
            .map(|(fp, at)| (PostingFingerprint::from_hex(fp), at))
            .collect();

        info!(path = %self.path.display(), entries = self.entries.len(), "Loaded seen store");
        Ok(())
    }

    fn has(&self, fingerprint: &PostingFingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    fn record_all(
        &mut self,
        fingerprints: &[PostingFingerprint],
        at: DateTime<Utc>,
    ) -> Vec<PostingFingerprint> {
        insert_new(&mut self.entries, fingerprints, at)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Write to a temp file in the same directory, then rename over the target.
    async fn save(&self) -> Result<(), ScoutError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let body = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| ScoutError::SeenStore(format!("cannot serialize seen store: {e}")))?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), ScoutError> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(body.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| {
                ScoutError::SeenStore(format!("cannot replace {}: {}", path.display(), e.error))
            })?;
            Ok(())
        })
        .await
        .map_err(|e| ScoutError::SeenStore(format!("save task failed: {e}")))??;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Saved seen store");
        Ok(())
    }
}

// --- In-memory ---

#[derive(Default)]
pub struct MemorySeenStore {
    entries: BTreeMap<PostingFingerprint, DateTime<Utc>>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    async fn load(&mut self) -> Result<(), ScoutError> {
        Ok(())
    }

    fn has(&self, fingerprint: &PostingFingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    fn record_all(
        &mut self,
        fingerprints: &[PostingFingerprint],
        at: DateTime<Utc>,
    ) -> Vec<PostingFingerprint> {
        insert_new(&mut self.entries, fingerprints, at)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    async fn save(&self) -> Result<(), ScoutError> {
        Ok(())
    }
}
