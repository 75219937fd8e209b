//! Heuristic derived-artifact modules: key-point ranking, entity and
//! number extraction, comparison tables, BM25 quick answers and typed
//! auto-extraction. Everything here is defensive: no signal in, empty
//! typed records out.

pub mod answer;
pub mod autoextract;
pub mod comparison;
pub mod entities;
pub mod keypoints;
pub mod numbers;

pub use answer::{quick_answer, QuickAnswer};
pub use autoextract::{auto_extract, detect_page_type, PageType};
pub use comparison::{detect_comparison, ComparisonTable};
pub use entities::extract_entities;
pub use keypoints::{dedupe_sentences, extract_key_points};
pub use numbers::{extract_dates, extract_numbers, NumberFacts};

/// Sentence lengths considered usable by the ranking heuristics.
const MIN_SENTENCE_LEN: usize = 20;
const MAX_SENTENCE_LEN: usize = 500;

/// Split text into sentences on `.`/`!`/`?` boundaries followed by
/// whitespace, keeping only sentences of usable length.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let boundary = chars.peek().map(|n| n.is_whitespace()).unwrap_or(true);
            if boundary {
                push_sentence(&mut out, &mut current);
            }
        } else if c == '\n' && chars.peek() == Some(&'\n') {
            push_sentence(&mut out, &mut current);
        }
    }
    push_sentence(&mut out, &mut current);
    out
}

fn push_sentence(out: &mut Vec<String>, current: &mut String) {
    let sentence = current.split_whitespace().collect::<Vec<_>>().join(" ");
    current.clear();
    if (MIN_SENTENCE_LEN..=MAX_SENTENCE_LEN).contains(&sentence.len()) {
        out.push(sentence);
    }
}

/// Lowercased word tokens longer than two characters.
pub(crate) fn content_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}
