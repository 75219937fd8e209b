//! Main-content region detection.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;

/// Minimum visible text length for a region to count as main content.
const MIN_CONTENT_CHARS: usize = 100;

/// Semantic containers tried in priority order.
static PRIORITY_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article[role=\"main\"]",
        "main article",
        "article",
        "main",
        "[role=\"main\"]",
    ]
    .iter()
    .filter_map(|s| Selector::parse(s).ok())
    .collect()
});

static BLOCK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("section, div").expect("static selector"));

/// Result of main-content detection.
#[derive(Debug, Clone)]
pub struct MainContent {
    pub html: String,
    /// False when no region qualified and the original document is
    /// returned unchanged.
    pub detected: bool,
}

fn visible_text_len(el: scraper::ElementRef<'_>) -> usize {
    el.text()
        .flat_map(|t| t.split_whitespace())
        .map(|w| w.len() + 1)
        .sum()
}

/// Find the primary content region of a document.
///
/// Tries semantic containers first, then falls back to the `section`/
/// `div` with the most visible text. Documents with no qualifying region
/// come back unchanged with `detected = false`.
pub fn detect_main_content(html: &str) -> MainContent {
    let doc = Html::parse_document(html);

    for selector in PRIORITY_SELECTORS.iter() {
        if let Some(el) = doc
            .select(selector)
            .find(|el| visible_text_len(*el) >= MIN_CONTENT_CHARS)
        {
            debug!(region = %el.value().name(), "main content detected via semantic container");
            return MainContent {
                html: el.html(),
                detected: true,
            };
        }
    }

    let largest = doc
        .select(&BLOCK_SELECTOR)
        .map(|el| (visible_text_len(el), el))
        .filter(|(len, _)| *len >= MIN_CONTENT_CHARS)
        .max_by_key(|(len, _)| *len);
    if let Some((len, el)) = largest {
        debug!(chars = len, "main content detected via largest block");
        return MainContent {
            html: el.html(),
            detected: true,
        };
    }

    MainContent {
        html: html.to_string(),
        detected: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(words: usize) -> String {
        "content ".repeat(words)
    }

    #[test]
    fn prefers_article_over_surrounding_chrome() {
        let html = format!(
            "<html><body><nav>menu menu menu</nav><article>{}</article><footer>foot</footer></body></html>",
            filler(40)
        );
        let main = detect_main_content(&html);
        assert!(main.detected);
        assert!(main.html.starts_with("<article>"));
        assert!(!main.html.contains("menu"));
    }

    #[test]
    fn short_articles_do_not_qualify() {
        let html = format!(
            "<body><article>tiny</article><div>{}</div></body>",
            filler(40)
        );
        let main = detect_main_content(&html);
        assert!(main.detected);
        assert!(main.html.starts_with("<div>"));
    }

    #[test]
    fn falls_back_to_largest_div() {
        let html = format!(
            "<body><div id=\"a\">{}</div><div id=\"b\">{}</div></body>",
            filler(20),
            filler(60)
        );
        let main = detect_main_content(&html);
        assert!(main.detected);
        assert!(main.html.contains("id=\"b\""));
    }

    #[test]
    fn undetectable_documents_pass_through() {
        let html = "<body><p>just a short page</p></body>";
        let main = detect_main_content(html);
        assert!(!main.detected);
        assert_eq!(main.html, html);
    }

    #[test]
    fn role_main_is_honored() {
        let html = format!(
            "<body><div role=\"main\">{}</div><div>{}</div></body>",
            filler(30),
            filler(90)
        );
        let main = detect_main_content(&html);
        assert!(main.detected);
        assert!(main.html.contains("role=\"main\""));
    }
}
