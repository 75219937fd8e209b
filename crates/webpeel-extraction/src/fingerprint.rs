//! Content fingerprints and extraction quality scoring.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn normalized_digest(content: &str) -> String {
    let normalized = WHITESPACE.replace_all(content.trim(), " ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short content fingerprint: first 16 hex chars of the SHA-256 of the
/// whitespace-normalized content. A verifiable prefix of [`fingerprint64`].
pub fn fingerprint16(content: &str) -> String {
    normalized_digest(content)[..16].to_string()
}

/// Full-length snapshot fingerprint over the same normalized digest.
pub fn fingerprint64(content: &str) -> String {
    normalized_digest(content)
}

/// Extraction quality estimate in [0, 1].
///
/// Blends the extracted/raw length ratio, heading presence, markdown
/// formatting density and a minimum-length floor. Zero when nothing was
/// extracted.
pub fn quality_score(content: &str, html_len: usize) -> f64 {
    let content = content.trim();
    if content.is_empty() {
        return 0.0;
    }

    let ratio = if html_len > 0 {
        (content.len() as f64 / html_len as f64).min(1.0)
    } else {
        1.0
    };
    // Flat pages extract almost nothing; scale the ratio term up so a
    // typical 5-15% text yield still scores well.
    let extraction = (ratio * 8.0).min(1.0);

    let has_heading = content.lines().any(|l| l.starts_with('#'));
    let heading = if has_heading { 1.0 } else { 0.0 };

    let format_chars = content
        .chars()
        .filter(|c| matches!(c, '#' | '*' | '`' | '[' | '>' | '|' | '-'))
        .count();
    let formatting = ((format_chars as f64 / content.len() as f64) * 40.0).min(1.0);

    let length_floor = (content.len() as f64 / 500.0).min(1.0);

    (0.35 * extraction + 0.25 * heading + 0.2 * formatting + 0.2 * length_floor).clamp(0.0, 1.0)
}
