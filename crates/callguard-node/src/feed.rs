//! File-based spam feed.
//!
//! The feed is a JSON document with a SHA-256 sidecar file next to it
//! (`<feed>.sha256`, hex digest). A document whose digest does not match
//! is rejected before parsing, so a half-written or tampered download
//! never reaches the store.
//!
//! ```json
//! {
//!   "version": 3,
//!   "entries": [
//!     { "number": "+33162000001", "tag": "telemarketing", "score": 87,
//!       "source": "community", "last_seen": "2025-06-01T08:00:00Z" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use callguard_phone::PhoneNumberNormalizer;
use callguard_types::repository::SpamFeed;
use callguard_types::{CallguardError, Result, SpamRecord, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Source recorded for entries that do not name one.
pub const DEFAULT_SOURCE: &str = "feed";

/// Extension appended to the feed path to find its digest.
pub const CHECKSUM_EXTENSION: &str = "sha256";

// ---------------------------------------------------------------------------
// Document format
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedDocument {
    #[serde(default)]
    pub version: u32,
    pub entries: Vec<FeedEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedEntry {
    pub number: String,
    pub tag: String,
    pub score: u32,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub last_seen: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// FileSpamFeed
// ---------------------------------------------------------------------------

/// [`SpamFeed`] reading a local feed document and its digest.
pub struct FileSpamFeed {
    path: PathBuf,
    checksum_path: PathBuf,
    normalizer: Arc<PhoneNumberNormalizer>,
}

impl FileSpamFeed {
    pub fn new(path: impl Into<PathBuf>, normalizer: Arc<PhoneNumberNormalizer>) -> Self {
        let path = path.into();
        let checksum_path = checksum_path_for(&path);
        Self {
            path,
            checksum_path,
            normalizer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Turns a verified document into records keyed by canonical number.
    ///
    /// Entries whose number has no canonical form are dropped and
    /// counted in a warning.
    pub fn records_from(&self, document: FeedDocument, now: Timestamp) -> Vec<SpamRecord> {
        let total = document.entries.len();
        let records: Vec<SpamRecord> = document
            .entries
            .into_iter()
            .filter_map(|entry| {
                let number = self.normalizer.normalize(&entry.number)?;
                Some(SpamRecord {
                    number,
                    tag: entry.tag,
                    score: entry.score,
                    source: entry.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                    last_seen: entry.last_seen.unwrap_or(now),
                })
            })
            .collect();
        if records.len() < total {
            tracing::warn!(
                dropped = total - records.len(),
                "spam feed entries without a usable number were dropped"
            );
        }
        records
    }
}

#[async_trait]
impl SpamFeed for FileSpamFeed {
    async fn fetch(&self) -> Result<Vec<SpamRecord>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| sync_err(&self.path, e))?;
        let expected = tokio::fs::read_to_string(&self.checksum_path)
            .await
            .map_err(|e| sync_err(&self.checksum_path, e))?;
        verify_checksum(&bytes, &expected)?;

        let document: FeedDocument =
            serde_json::from_slice(&bytes).map_err(|e| CallguardError::SyncError {
                reason: format!("malformed spam feed {}: {e}", self.path.display()),
            })?;
        tracing::debug!(
            version = document.version,
            entries = document.entries.len(),
            "spam feed verified"
        );
        Ok(self.records_from(document, Timestamp::now()))
    }
}

// ---------------------------------------------------------------------------
// Integrity
// ---------------------------------------------------------------------------

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Checks `bytes` against a hex digest. Surrounding whitespace and
/// letter case in `expected` are ignored, as is anything after the
/// first whitespace (the `sha256sum` output format).
pub fn verify_checksum(bytes: &[u8], expected: &str) -> Result<()> {
    let expected = expected
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let actual = sha256_hex(bytes);
    if expected != actual {
        return Err(CallguardError::SyncError {
            reason: format!("spam feed checksum mismatch: expected {expected}, got {actual}"),
        });
    }
    Ok(())
}

/// `<path>.sha256`.
pub fn checksum_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(CHECKSUM_EXTENSION);
    PathBuf::from(name)
}

fn sync_err(path: &Path, e: std::io::Error) -> CallguardError {
    CallguardError::SyncError {
        reason: format!("cannot read {}: {e}", path.display()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_accepts_sha256sum_format() {
        let body = b"{\"entries\":[]}";
        let digest = sha256_hex(body);
        assert!(verify_checksum(body, &digest).is_ok());
        assert!(verify_checksum(body, &format!("{}  feed.json\n", digest.to_uppercase())).is_ok());
    }

    #[test]
    fn checksum_mismatch_is_sync_error() {
        let result = verify_checksum(b"tampered", &sha256_hex(b"original"));
        assert!(matches!(result, Err(CallguardError::SyncError { .. })));
        assert!(verify_checksum(b"x", "").is_err());
    }

    #[test]
    fn sidecar_path_appends_extension() {
        assert_eq!(
            checksum_path_for(Path::new("/var/lib/feed.json")),
            PathBuf::from("/var/lib/feed.json.sha256")
        );
    }

    #[test]
    fn records_are_normalized_and_defaulted() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let feed = FileSpamFeed::new("feed.json", Arc::new(PhoneNumberNormalizer::default()));
        let document: FeedDocument = serde_json::from_str(
            r#"{"entries":[
                {"number":"01 62 00 00 01","tag":"telemarketing","score":87},
                {"number":"---","tag":"junk","score":1},
                {"number":"+33162000002","tag":"scam","score":99,"source":"community",
                 "last_seen":"2025-06-01T08:00:00Z"}
            ]}"#,
        )?;
        let now: Timestamp = "2025-06-15T12:00:00Z".parse()?;

        let records = feed.records_from(document, now);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].number.as_str(), "+33162000001");
        assert_eq!(records[0].source, DEFAULT_SOURCE);
        assert_eq!(records[0].last_seen, now);
        assert_eq!(records[1].source, "community");
        assert_ne!(records[1].last_seen, now);
        Ok(())
    }
}
