//! Bot-challenge page detection.

use once_cell::sync::Lazy;
use regex::Regex;

/// Markers that appear in anti-bot interstitials across the major
/// providers. Matched case-insensitively against title and body.
static CHALLENGE_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)just a moment|verify you are human|cf-challenge|cf_chl_|checking your browser|attention required|captcha|ddos-guard|are you a robot|access denied.{0,40}cloudflare",
    )
    .unwrap()
});

/// Pages under this size with a challenge marker are interstitials, not
/// content that happens to mention a captcha.
const SMALL_PAGE_BYTES: usize = 8_192;

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

/// Heuristic: does this HTML look like an anti-bot challenge page rather
/// than the requested content?
pub fn looks_like_challenge(html: &str, status: u16) -> bool {
    if html.is_empty() {
        return false;
    }

    if let Some(caps) = TITLE.captures(html) {
        if CHALLENGE_MARKERS.is_match(&caps[1]) {
            return true;
        }
    }

    // Challenge interstitials are small; real pages that merely mention a
    // captcha are not.
    if html.len() < SMALL_PAGE_BYTES && CHALLENGE_MARKERS.is_match(html) {
        return true;
    }

    // Cloudflare serves its managed challenge with 403/503 regardless of
    // body size.
    if matches!(status, 403 | 503) && CHALLENGE_MARKERS.is_match(html) {
        return true;
    }

    false
}
