//! Image inventory extraction: `<img>`, `<picture>` sources and CSS
//! background images.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;
use webpeel_types::ImageInfo;

use crate::links::effective_base;

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("static selector"));
static PICTURE_SOURCE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("picture source[srcset]").expect("static selector"));
static BG_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"background-image\s*:\s*url\(\s*['"]?([^'")]+)['"]?\s*\)"#).unwrap());

/// Extract page images as absolute http(s) URLs, deduplicated by final
/// URL in discovery order, preserving alt/title/dimensions when present.
pub fn extract_images(html: &str, page_url: &Url) -> Vec<ImageInfo> {
    let doc = Html::parse_document(html);
    let base = effective_base(&doc, page_url);

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut push = |url: String, alt: Option<String>, title: Option<String>, w, h| {
        if seen.insert(url.clone()) {
            out.push(ImageInfo {
                url,
                alt,
                title,
                width: w,
                height: h,
            });
        }
    };

    for el in doc.select(&IMG) {
        let v = el.value();
        let src = match v.attr("src") {
            Some(s) if !s.trim().is_empty() => s.trim(),
            _ => continue,
        };
        if let Some(abs) = absolutize(&base, src) {
            push(
                abs,
                non_empty(v.attr("alt")),
                non_empty(v.attr("title")),
                numeric(v.attr("width")),
                numeric(v.attr("height")),
            );
        }
    }

    for el in doc.select(&PICTURE_SOURCE) {
        if let Some(srcset) = el.value().attr("srcset") {
            for candidate in parse_srcset(srcset) {
                if let Some(abs) = absolutize(&base, &candidate) {
                    push(abs, None, None, None, None);
                }
            }
        }
    }

    for caps in BG_IMAGE.captures_iter(html) {
        if let Some(abs) = absolutize(&base, caps[1].trim()) {
            push(abs, None, None, None, None);
        }
    }

    out
}

/// Parse a `srcset` attribute: comma-separated `url [descriptor]` pairs
/// where the descriptor is a density (`2x`) or width (`640w`) hint.
pub fn parse_srcset(srcset: &str) -> Vec<String> {
    srcset
        .split(',')
        .filter_map(|entry| {
            let url = entry.trim().split_whitespace().next()?;
            (!url.is_empty()).then(|| url.to_string())
        })
        .collect()
}

fn absolutize(base: &Url, raw: &str) -> Option<String> {
    if raw.starts_with("data:") {
        return None;
    }
    let resolved = base.join(raw).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn non_empty(attr: Option<&str>) -> Option<String> {
    attr.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn numeric(attr: Option<&str>) -> Option<u32> {
    attr.and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.com/post/").unwrap()
    }

    #[test]
    fn img_tags_with_attributes() {
        let html =
            r#"<img src="/a.png" alt="Alpha" title="T" width="300" height="200"><img src="a.png">"#;
        let images = extract_images(html, &page());
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, "https://example.com/a.png");
        assert_eq!(images[0].alt.as_deref(), Some("Alpha"));
        assert_eq!(images[0].width, Some(300));
        assert_eq!(images[1].url, "https://example.com/post/a.png");
    }

    #[test]
    fn srcset_candidates_are_parsed() {
        assert_eq!(
            parse_srcset("/s.png 1x, /m.png 2x"),
            vec!["/s.png".to_string(), "/m.png".to_string()]
        );
        assert_eq!(
            parse_srcset("/a.png 100w, /b.png 200w"),
            vec!["/a.png".to_string(), "/b.png".to_string()]
        );
    }

    #[test]
    fn picture_sources_and_backgrounds_are_collected() {
        let html = r#"
            <picture><source srcset="/hero-s.webp 1x, /hero-l.webp 2x"><img src="/hero.jpg"></picture>
            <div style="background-image: url('/bg.jpg')">x</div>
        "#;
        let urls: Vec<String> = extract_images(html, &page())
            .into_iter()
            .map(|i| i.url)
            .collect();
        assert!(urls.contains(&"https://example.com/hero.jpg".to_string()));
        assert!(urls.contains(&"https://example.com/hero-s.webp".to_string()));
        assert!(urls.contains(&"https://example.com/hero-l.webp".to_string()));
        assert!(urls.contains(&"https://example.com/bg.jpg".to_string()));
    }

    #[test]
    fn duplicates_and_data_uris_are_dropped() {
        let html = r#"<img src="/a.png"><img src="/a.png"><img src="data:image/png;base64,xx">"#;
        let images = extract_images(html, &page());
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn non_numeric_dimensions_are_ignored() {
        let html = r#"<img src="/a.png" width="100%" height="auto">"#;
        let images = extract_images(html, &page());
        assert_eq!(images[0].width, None);
        assert_eq!(images[0].height, None);
    }
}
