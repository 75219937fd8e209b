//! Page metadata extraction: title, description, author, dates, language,
//! canonical URL, social image and word count.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use webpeel_types::PageMetadata;

macro_rules! sel {
    ($name:ident, $css:expr) => {
        static $name: Lazy<Selector> =
            Lazy::new(|| Selector::parse($css).expect("static selector"));
    };
}

sel!(TITLE, "title");
sel!(H1, "h1");
sel!(META, "meta");
sel!(CANONICAL, "link[rel=\"canonical\"]");
sel!(HTML_TAG, "html");
sel!(TIME_PUBDATE, "time[pubdate]");
sel!(JSON_LD, "script[type=\"application/ld+json\"]");

/// Pull the title and metadata record out of a document.
///
/// `fetched_at` and `method` are left unset for the caller to fill.
pub fn extract_metadata(html: &str) -> (String, PageMetadata) {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, "property", "og:title")
        .or_else(|| meta_content(&doc, "name", "twitter:title"))
        .or_else(|| element_text(&doc, &TITLE))
        .or_else(|| element_text(&doc, &H1))
        .unwrap_or_default();

    let description = meta_content(&doc, "property", "og:description")
        .or_else(|| meta_content(&doc, "name", "twitter:description"))
        .or_else(|| meta_content(&doc, "name", "description"));

    let author = meta_content(&doc, "property", "article:author")
        .or_else(|| meta_content(&doc, "property", "og:article:author"))
        .or_else(|| meta_content(&doc, "name", "author"))
        .or_else(|| meta_content(&doc, "name", "twitter:creator"));

    let published = meta_content(&doc, "property", "article:published_time")
        .or_else(|| meta_content(&doc, "name", "date"))
        .or_else(|| meta_content(&doc, "property", "og:updated_time"))
        .or_else(|| time_pubdate(&doc))
        .or_else(|| json_ld_date_published(&doc));
    let publish_date = published.as_deref().and_then(normalize_date);

    let language = doc
        .select(&HTML_TAG)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| meta_http_equiv(&doc, "content-language"))
        .or_else(|| meta_content(&doc, "property", "og:locale").map(|l| l.replace('_', "-")));

    let canonical = doc
        .select(&CANONICAL)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| meta_content(&doc, "property", "og:url"));

    let image = meta_content(&doc, "property", "og:image")
        .or_else(|| meta_content(&doc, "name", "twitter:image"));

    let metadata = PageMetadata {
        description,
        author,
        published,
        publish_date,
        image,
        canonical,
        language,
        word_count: word_count(&doc),
        fetched_at: None,
        method: None,
    };
    (title, metadata)
}

fn meta_content(doc: &Html, attr: &str, value: &str) -> Option<String> {
    doc.select(&META)
        .find(|el| el.value().attr(attr).is_some_and(|v| v.eq_ignore_ascii_case(value)))
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn meta_http_equiv(doc: &Html, name: &str) -> Option<String> {
    doc.select(&META)
        .find(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case(name))
        })
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn element_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(collapse_element_text)
        .filter(|s| !s.is_empty())
}

fn collapse_element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn time_pubdate(doc: &Html) -> Option<String> {
    doc.select(&TIME_PUBDATE).next().map(|el| {
        el.value()
            .attr("datetime")
            .map(|s| s.to_string())
            .unwrap_or_else(|| collapse_element_text(el))
    })
}

fn json_ld_date_published(doc: &Html) -> Option<String> {
    for script in doc.select(&JSON_LD) {
        let raw: String = script.text().collect();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
            if let Some(date) = find_date_published(&value) {
                return Some(date);
            }
        }
    }
    None
}

fn find_date_published(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(s)) = map.get("datePublished") {
                return Some(s.clone());
            }
            map.values().find_map(find_date_published)
        }
        serde_json::Value::Array(items) => items.iter().find_map(find_date_published),
        _ => None,
    }
}

static MONTH_DAY_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-z]+ \d{1,2}, \d{4}$").unwrap());

/// Normalize a date string to ISO 8601. Returns `None` when the input is
/// not recognizably a date.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.to_rfc3339());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.to_rfc3339());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(format!("{}Z", dt.format("%Y-%m-%dT%H:%M:%S")));
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    if MONTH_DAY_YEAR.is_match(raw) {
        for fmt in ["%B %d, %Y", "%b %d, %Y"] {
            if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
                return Some(d.format("%Y-%m-%d").to_string());
            }
        }
    }
    None
}

/// Count whitespace-separated words in the document's visible text.
fn word_count(doc: &Html) -> usize {
    let mut count = 0;
    let mut skip_depth: Vec<ego_tree::NodeId> = Vec::new();
    for edge in doc.tree.root().traverse() {
        match edge {
            ego_tree::iter::Edge::Open(node) => {
                if let scraper::Node::Element(el) = node.value() {
                    if matches!(el.name(), "script" | "style" | "noscript" | "template") {
                        skip_depth.push(node.id());
                    }
                } else if let scraper::Node::Text(text) = node.value() {
                    if skip_depth.is_empty() {
                        count += text.split_whitespace().count();
                    }
                }
            }
            ego_tree::iter::Edge::Close(node) => {
                if skip_depth.last() == Some(&node.id()) {
                    skip_depth.pop();
                }
            }
        }
    }
    count
}
