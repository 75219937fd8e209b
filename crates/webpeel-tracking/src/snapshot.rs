//! Snapshot persistence and the change-tracking entry point.

use crate::diff::lcs_diff;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use webpeel_types::{ChangeStatus, ChangeSummary};

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid snapshot pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A stored observation of one URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub url: String,
    /// Full 64-hex-char content fingerprint.
    pub fingerprint: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Snapshot {
    /// The observation time as ISO 8601.
    pub fn timestamp_iso(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .map(|d| d.to_rfc3339())
            .unwrap_or_default()
    }
}

/// Disk-backed per-URL snapshot store with diffing.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    dir: PathBuf,
}

impl ChangeTracker {
    /// Tracker rooted at an explicit directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Tracker rooted at `~/.webpeel/snapshots`.
    pub fn default_location() -> Self {
        let dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".webpeel")
            .join("snapshots");
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    /// Load the stored snapshot for a URL. Missing or unreadable files
    /// read as "no prior observation".
    pub async fn get_snapshot(&self, url: &str) -> Option<Snapshot> {
        let path = self.path_for(url);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable snapshot");
                None
            }
        }
    }

    /// Record an observation and report what changed.
    ///
    /// `fingerprint` is the full 64-char content fingerprint. The
    /// snapshot file is replaced on every call via rename-into-place so
    /// concurrent readers never see a torn write.
    pub async fn track(
        &self,
        url: &str,
        content: &str,
        fingerprint: &str,
    ) -> Result<ChangeSummary, TrackingError> {
        let prior = self.get_snapshot(url).await;
        let now = Utc::now().timestamp_millis();

        match prior {
            None => {
                let snapshot = Snapshot {
                    url: url.to_string(),
                    fingerprint: fingerprint.to_string(),
                    content: content.to_string(),
                    timestamp: now,
                    metadata: None,
                };
                self.write_snapshot(url, &snapshot).await?;
                debug!(url, "first snapshot recorded");
                Ok(ChangeSummary {
                    status: ChangeStatus::New,
                    previous_scrape_at: None,
                    diff: None,
                })
            }
            Some(prior) if prior.fingerprint == fingerprint => {
                let previous_at = prior.timestamp_iso();
                let snapshot = Snapshot {
                    timestamp: now,
                    ..prior
                };
                self.write_snapshot(url, &snapshot).await?;
                Ok(ChangeSummary {
                    status: ChangeStatus::Same,
                    previous_scrape_at: Some(previous_at),
                    diff: None,
                })
            }
            Some(prior) => {
                let diff = lcs_diff(&prior.content, content);
                let previous_at = prior.timestamp_iso();
                let snapshot = Snapshot {
                    url: url.to_string(),
                    fingerprint: fingerprint.to_string(),
                    content: content.to_string(),
                    timestamp: now,
                    metadata: Some(json!({
                        "previousFingerprint": prior.fingerprint,
                        "previousTimestamp": prior.timestamp,
                    })),
                };
                self.write_snapshot(url, &snapshot).await?;
                debug!(
                    url,
                    additions = diff.additions,
                    deletions = diff.deletions,
                    "content change recorded"
                );
                Ok(ChangeSummary {
                    status: ChangeStatus::Changed,
                    previous_scrape_at: Some(previous_at),
                    diff: Some(diff),
                })
            }
        }
    }

    /// Delete snapshots. Without a pattern everything goes; with one,
    /// each snapshot's URL is matched against the regex. Returns the
    /// number of deleted files.
    pub async fn clear_snapshots(&self, pattern: Option<&str>) -> Result<usize, TrackingError> {
        let regex = pattern.map(Regex::new).transpose()?;
        let mut deleted = 0;

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let matches = match &regex {
                None => true,
                Some(re) => {
                    let raw = tokio::fs::read_to_string(&path).await.unwrap_or_default();
                    serde_json::from_str::<Snapshot>(&raw)
                        .map(|s| re.is_match(&s.url))
                        .unwrap_or(false)
                }
            };
            if matches {
                tokio::fs::remove_file(&path).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn write_snapshot(&self, url: &str, snapshot: &Snapshot) -> Result<(), TrackingError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(url);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
