//! Markdown cleaning passes.

use once_cell::sync::Lazy;
use regex::Regex;

// The `(^|[^!])` guard keeps image syntax `![](…)` out of the match.
static EMPTY_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|[^!])\[\s*\]\([^)]*\)").unwrap());
static IMAGE_ONLY_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[!\[[^\]]*\]\([^)]*\)\]\([^)]*\)").unwrap());
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Baseline noise removal applied to every converted page (unless `raw`):
/// empty links, image-only links, excess blank lines, trailing spaces.
pub fn clean_markdown_noise(markdown: &str) -> String {
    let text = IMAGE_ONLY_LINK.replace_all(markdown, "");
    let text = EMPTY_LINK.replace_all(&text, "$1");
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let text = lines.join("\n");
    BLANK_RUN.replace_all(&text, "\n\n").trim().to_string()
}

static MD_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static MD_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap());
static CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d{1,3}\]").unwrap());
static BARE_URL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*https?://\S+\s*$\n?").unwrap());
static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static LINK_DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\[[^\]]+\]:\s+\S+.*$\n?").unwrap());

/// Aggressive cleaning for LLM consumption (`format=clean`).
///
/// On top of [`clean_markdown_noise`]: links inlined as their text, images
/// replaced by `[Image: alt]` (or removed when alt is empty), citation
/// markers, bare-URL lines, HTML comments and reference-style link
/// definitions stripped.
pub fn clean_for_ai(markdown: &str) -> String {
    let text = clean_markdown_noise(markdown);
    let text = HTML_COMMENT.replace_all(&text, "");
    let text = MD_IMAGE.replace_all(&text, |caps: &regex::Captures<'_>| {
        let alt = caps[1].trim().to_string();
        if alt.is_empty() {
            String::new()
        } else {
            format!("[Image: {}]", alt)
        }
    });
    let text = MD_LINK.replace_all(&text, "$1");
    let text = CITATION.replace_all(&text, "");
    let text = LINK_DEFINITION.replace_all(&text, "");
    let text = BARE_URL_LINE.replace_all(&text, "");
    clean_markdown_noise(&text)
}
