//! Page-type detection and typed heuristic extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

/// Coarse page classification driving the typed extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Pricing,
    Products,
    Contact,
    Article,
    ApiDocs,
    Unknown,
}

static PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$€£¥]\s?\d[\d,]*(?:\.\d+)?(?:\s?/\s?\w+)?").unwrap());
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d[\d\s().-]{7,}\d").unwrap());
static ENDPOINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(GET|POST|PUT|DELETE|PATCH)\s+(/\S+)").unwrap());
static SOCIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:www\.)?(?:twitter\.com|x\.com|facebook\.com|linkedin\.com|github\.com|instagram\.com)/\S+").unwrap()
});

/// Classify a page from its URL path and document signals.
pub fn detect_page_type(url: &Url, html: &str) -> PageType {
    let path = url.path().to_lowercase();
    if path.contains("pricing") || path.contains("plans") {
        return PageType::Pricing;
    }
    if path.contains("contact") {
        return PageType::Contact;
    }
    if path.contains("api") && (path.contains("doc") || path.contains("reference"))
        || path.contains("/api-reference")
        || ENDPOINT.find_iter(html).count() >= 3
    {
        return PageType::ApiDocs;
    }
    if path.contains("/product") || path.contains("/shop") || path.contains("/store") {
        return PageType::Products;
    }

    let lower = html.to_lowercase();
    if lower.contains("og:type\" content=\"article")
        || lower.contains("og:type' content='article")
        || lower.contains("<article")
    {
        return PageType::Article;
    }
    if PRICE.find_iter(html).count() >= 3 && lower.contains("per month") {
        return PageType::Pricing;
    }
    PageType::Unknown
}

/// Run the typed extractor for the detected page type.
///
/// Always returns a record of shape `{"type": …, "data": …}`; extractors
/// that find nothing return their type with empty collections.
pub fn auto_extract(url: &Url, html: &str, markdown: &str) -> serde_json::Value {
    let page_type = detect_page_type(url, html);
    let data = match page_type {
        PageType::Pricing => extract_pricing(markdown),
        PageType::Products => extract_products(markdown),
        PageType::Contact => extract_contact(html, markdown),
        PageType::Article => extract_article(markdown),
        PageType::ApiDocs => extract_api_docs(markdown),
        PageType::Unknown => extract_outline(markdown),
    };
    json!({ "type": page_type, "data": data })
}

/// Sections of a markdown document: heading plus following body lines.
fn sections(markdown: &str) -> Vec<(String, Vec<String>)> {
    let mut out: Vec<(String, Vec<String>)> = Vec::new();
    for line in markdown.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix('#') {
            let title = heading.trim_start_matches('#').trim().to_string();
            if !title.is_empty() {
                out.push((title, Vec::new()));
            }
        } else if let Some((_, body)) = out.last_mut() {
            if !trimmed.is_empty() {
                body.push(trimmed.to_string());
            }
        }
    }
    out
}

fn extract_pricing(markdown: &str) -> serde_json::Value {
    let mut plans = Vec::new();
    for (title, body) in sections(markdown) {
        let text = body.join("\n");
        let price = PRICE.find(&text).map(|m| m.as_str().to_string());
        if price.is_none() {
            continue;
        }
        let features: Vec<String> = body
            .iter()
            .filter_map(|l| l.strip_prefix("- ").map(|f| f.trim().to_string()))
            .collect();
        plans.push(json!({ "name": title, "price": price, "features": features }));
    }
    json!({ "plans": plans })
}

fn extract_products(markdown: &str) -> serde_json::Value {
    let mut products = Vec::new();
    for (title, body) in sections(markdown) {
        let text = body.join("\n");
        if let Some(price) = PRICE.find(&text) {
            let description = body.iter().find(|l| !l.starts_with('-')).cloned();
            products.push(json!({
                "name": title,
                "price": price.as_str(),
                "description": description,
            }));
        }
    }
    json!({ "products": products })
}

fn extract_contact(html: &str, markdown: &str) -> serde_json::Value {
    let combined = format!("{}\n{}", markdown, html);
    let emails = unique_matches(&EMAIL, &combined, 10);
    let phones: Vec<String> = unique_matches(&PHONE, markdown, 10)
        .into_iter()
        .filter(|p| p.chars().filter(|c| c.is_ascii_digit()).count() >= 7)
        .collect();
    let social = unique_matches(&SOCIAL, &combined, 10);
    json!({ "emails": emails, "phones": phones, "social": social })
}

fn extract_article(markdown: &str) -> serde_json::Value {
    let title = markdown
        .lines()
        .find(|l| l.starts_with('#'))
        .map(|l| l.trim_start_matches('#').trim().to_string());
    let summary = markdown
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.starts_with('#') && p.len() > 40)
        .map(|p| p.to_string());
    json!({ "title": title, "summary": summary })
}

fn extract_api_docs(markdown: &str) -> serde_json::Value {
    let mut endpoints = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for caps in ENDPOINT.captures_iter(markdown) {
        let key = format!("{} {}", &caps[1], &caps[2]);
        if seen.insert(key) {
            endpoints.push(json!({ "method": &caps[1], "path": &caps[2] }));
        }
    }
    json!({ "endpoints": endpoints })
}

fn extract_outline(markdown: &str) -> serde_json::Value {
    let headings: Vec<String> = markdown
        .lines()
        .filter(|l| l.starts_with('#'))
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .take(20)
        .collect();
    json!({ "headings": headings })
}

fn unique_matches(re: &Regex, text: &str, cap: usize) -> Vec<String> {
    let mut out = Vec::new();
    for m in re.find_iter(text) {
        let s = m.as_str().to_string();
        if !out.contains(&s) {
            out.push(s);
        }
        if out.len() >= cap {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{}", path)).unwrap()
    }

    #[test]
    fn url_path_drives_classification() {
        assert_eq!(detect_page_type(&url("/pricing"), ""), PageType::Pricing);
        assert_eq!(detect_page_type(&url("/contact-us"), ""), PageType::Contact);
        assert_eq!(
            detect_page_type(&url("/docs/api-reference"), ""),
            PageType::ApiDocs
        );
        assert_eq!(detect_page_type(&url("/products/x"), ""), PageType::Products);
        assert_eq!(detect_page_type(&url("/blog/post"), ""), PageType::Unknown);
    }

    #[test]
    fn article_detected_from_og_type() {
        let html = r#"<meta property="og:type" content="article">"#;
        assert_eq!(detect_page_type(&url("/blog/post"), html), PageType::Article);
    }

    #[test]
    fn pricing_plans_extract_names_prices_features() {
        let markdown = "## Starter\n\n$9/month\n\n- 100 requests\n- Email support\n\n\
            ## Pro\n\n$49/month\n\n- Unlimited requests";
        let out = extract_pricing(markdown);
        let plans = out["plans"].as_array().unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0]["name"], "Starter");
        assert_eq!(plans[0]["price"], "$9/month");
        assert_eq!(plans[0]["features"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn contact_extractor_finds_emails_and_socials() {
        let markdown = "Reach us at hello@example.com or call +1 (555) 010-2030.";
        let html = r#"<a href="https://twitter.com/example">tw</a>"#;
        let out = extract_contact(html, markdown);
        assert_eq!(out["emails"][0], "hello@example.com");
        assert_eq!(out["phones"].as_array().unwrap().len(), 1);
        assert!(out["social"][0].as_str().unwrap().contains("twitter.com"));
    }

    #[test]
    fn api_docs_extractor_collects_endpoints() {
        let markdown = "Use GET /v1/items to list and POST /v1/items to create. GET /v1/items again.";
        let out = extract_api_docs(markdown);
        let endpoints = out["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 2);
    }

    #[test]
    fn extractors_are_defensive_on_empty_input() {
        let out = auto_extract(&url("/pricing"), "", "");
        assert_eq!(out["type"], "pricing");
        assert_eq!(out["data"]["plans"].as_array().unwrap().len(), 0);
    }
}
