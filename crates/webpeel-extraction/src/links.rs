//! Link inventory extraction.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

static ANCHORS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static BASE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("base[href]").expect("static selector"));

/// Effective base for resolving relative references: a `<base href>` when
/// present, otherwise the page URL itself.
pub(crate) fn effective_base(doc: &Html, page_url: &Url) -> Url {
    doc.select(&BASE)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .unwrap_or_else(|| page_url.clone())
}

/// Extract every `<a href>` as an absolute http(s) URL, deduplicated and
/// sorted. Anchor-only references to the same page are dropped.
pub fn extract_links(html: &str, page_url: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    let base = effective_base(&doc, page_url);

    let mut out = BTreeSet::new();
    for el in doc.select(&ANCHORS) {
        let href = match el.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let resolved = match base.join(href) {
            Ok(u) => u,
            Err(_) => continue,
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        // A link that resolves back to this page with only a fragment
        // attached is still a same-page anchor.
        if resolved.fragment().is_some() {
            let mut stripped = resolved.clone();
            stripped.set_fragment(None);
            if stripped == *page_url {
                continue;
            }
        }
        out.insert(resolved.to_string());
    }
    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.com/dir/page.html").unwrap()
    }

    #[test]
    fn resolves_relative_links_and_sorts() {
        let html = r#"<a href="b.html">b</a><a href="/a.html">a</a><a href="b.html">dup</a>"#;
        let links = extract_links(html, &page());
        assert_eq!(
            links,
            vec![
                "https://example.com/a.html".to_string(),
                "https://example.com/dir/b.html".to_string(),
            ]
        );
    }

    #[test]
    fn drops_non_http_schemes_and_anchors() {
        let html = r##"
            <a href="mailto:x@y.com">mail</a>
            <a href="javascript:void(0)">js</a>
            <a href="#section">anchor</a>
            <a href="https://ok.com/p">ok</a>
        "##;
        let links = extract_links(html, &page());
        assert_eq!(links, vec!["https://ok.com/p".to_string()]);
    }

    #[test]
    fn honors_base_href() {
        let html = r#"<base href="https://cdn.example.org/root/"><a href="x.html">x</a>"#;
        let links = extract_links(html, &page());
        assert_eq!(links, vec!["https://cdn.example.org/root/x.html".to_string()]);
    }

    #[test]
    fn same_page_fragment_after_resolution_is_dropped() {
        let html = r#"<a href="page.html#top">top</a><a href="page.html">self</a>"#;
        let links = extract_links(html, &page());
        assert_eq!(
            links,
            vec!["https://example.com/dir/page.html".to_string()]
        );
    }

    #[test]
    fn empty_html_yields_no_links() {
        assert!(extract_links("", &page()).is_empty());
    }
}
