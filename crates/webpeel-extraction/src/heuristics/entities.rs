//! Named-entity surface extraction over capitalized word runs.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static CAPITALIZED_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-zA-Z0-9]*(?:[ \t][A-Z][a-zA-Z0-9]*)*\b").unwrap()
});

/// Sentence-leading words and common prose words that capitalization
/// alone should not promote to entities.
const STOPWORDS: &[&str] = &[
    "The", "This", "That", "These", "Those", "There", "Then", "They", "When", "Where", "What",
    "While", "Which", "With", "Without", "From", "Here", "How", "Why", "You", "Your", "Our",
    "And", "But", "For", "Not", "All", "Any", "Its", "It", "In", "On", "At", "As", "If", "So",
    "We", "He", "She", "His", "Her", "More", "Most", "Some", "Other", "New", "First", "Last",
    "Also", "However", "Although", "Because", "After", "Before", "During", "Since",
];

/// Extract entities appearing in at least two distinct sources, ranked by
/// total frequency, capped at 20.
///
/// With fewer than two sources the multi-source requirement is waived so
/// single-document extraction still produces output.
pub fn extract_entities(sources: &[&str]) -> Vec<String> {
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    let mut frequency: HashMap<String, usize> = HashMap::new();
    let mut source_count: HashMap<String, HashSet<usize>> = HashMap::new();

    for (idx, source) in sources.iter().enumerate() {
        for m in CAPITALIZED_RUN.find_iter(source) {
            let candidate = m.as_str().trim();
            if candidate.len() < 3
                || candidate
                    .split_whitespace()
                    .all(|w| stopwords.contains(w))
            {
                continue;
            }
            // Single stopword-leading runs like "The Company" keep their
            // informative tail.
            let cleaned = strip_leading_stopword(candidate, &stopwords);
            if cleaned.len() < 3 {
                continue;
            }
            *frequency.entry(cleaned.to_string()).or_insert(0) += 1;
            source_count.entry(cleaned.to_string()).or_default().insert(idx);
        }
    }

    let min_sources = if sources.len() >= 2 { 2 } else { 1 };
    let mut entities: Vec<(String, usize)> = frequency
        .into_iter()
        .filter(|(name, _)| {
            source_count
                .get(name)
                .map(|s| s.len() >= min_sources)
                .unwrap_or(false)
        })
        .collect();
    entities.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entities.truncate(20);
    entities.into_iter().map(|(name, _)| name).collect()
}

fn strip_leading_stopword<'a>(candidate: &'a str, stopwords: &HashSet<&str>) -> &'a str {
    if let Some((first, rest)) = candidate.split_once(' ') {
        if stopwords.contains(first) && !rest.is_empty() {
            return rest;
        }
    }
    candidate
}
