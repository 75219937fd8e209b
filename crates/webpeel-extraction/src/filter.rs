//! Include/exclude selector filtering.

use lol_html::{element, RewriteStrSettings};
use scraper::{Html, Selector};
use tracing::warn;

/// Remove every node matching an `exclude` selector, then — when
/// `include` is non-empty — keep only the outer HTML of nodes matching
/// the include selectors, concatenated in selector order.
///
/// Invalid selectors are skipped with a warning rather than failing the
/// request.
pub fn filter_by_tags(html: &str, include: &[String], exclude: &[String]) -> String {
    let mut filtered = if exclude.is_empty() {
        html.to_string()
    } else {
        remove_matching(html, exclude)
    };

    if !include.is_empty() {
        let doc = Html::parse_document(&filtered);
        let mut kept = String::new();
        for raw in include {
            let selector = match Selector::parse(raw) {
                Ok(s) => s,
                Err(_) => {
                    warn!(selector = %raw, "skipping invalid include selector");
                    continue;
                }
            };
            for el in doc.select(&selector) {
                kept.push_str(&el.html());
                kept.push('\n');
            }
        }
        filtered = kept;
    }

    filtered
}

fn remove_matching(html: &str, selectors: &[String]) -> String {
    let mut handlers = Vec::new();
    for raw in selectors {
        // Validate before handing to the rewriter so a bad selector
        // cannot abort the whole pass.
        if raw.parse::<lol_html::Selector>().is_err() {
            warn!(selector = %raw, "skipping invalid exclude selector");
            continue;
        }
        handlers.push(element!(raw, |el| {
            el.remove();
            Ok(())
        }));
    }
    if handlers.is_empty() {
        return html.to_string();
    }

    match lol_html::rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    ) {
        Ok(out) => out,
        Err(e) => {
            warn!(error = %e, "exclude rewrite failed, returning input unchanged");
            html.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_pass_through() {
        let html = "<div><p>hello</p></div>";
        assert_eq!(filter_by_tags(html, &[], &[]), html);
    }

    #[test]
    fn exclude_removes_matching_subtrees() {
        let html = "<div><nav class=\"menu\">links</nav><p>body</p></div>";
        let out = filter_by_tags(html, &[], &["nav.menu".to_string()]);
        assert!(!out.contains("links"));
        assert!(out.contains("body"));
    }

    #[test]
    fn include_keeps_only_matches_in_selector_order() {
        let html = "<article><h1>T</h1></article><aside>side</aside><footer>F</footer>";
        let out = filter_by_tags(
            html,
            &["footer".to_string(), "article".to_string()],
            &[],
        );
        assert!(out.contains("<footer>F</footer>"));
        assert!(out.contains("<h1>T</h1>"));
        assert!(!out.contains("side"));
        // Selector order, not document order.
        assert!(out.find("footer").unwrap() < out.find("article").unwrap());
    }

    #[test]
    fn exclude_runs_before_include() {
        let html = "<article><h1>T</h1><div class=\"ad\">buy</div></article>";
        let out = filter_by_tags(
            html,
            &["article".to_string()],
            &["div.ad".to_string()],
        );
        assert!(out.contains("<h1>T</h1>"));
        assert!(!out.contains("buy"));
    }

    #[test]
    fn invalid_selectors_are_skipped() {
        let html = "<p>keep</p>";
        let out = filter_by_tags(html, &[], &["[[bad".to_string()]);
        assert!(out.contains("keep"));
    }
}
