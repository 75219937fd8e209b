//! Key-point ranking and near-duplicate sentence removal.

use super::{content_words, split_sentences};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,.]*").unwrap());

/// Words that mark a sentence as carrying a conclusion or instruction.
const SIGNAL_WORDS: &[&str] = &[
    "important",
    "key",
    "significant",
    "best",
    "top",
    "should",
    "must",
    "note",
    "critical",
    "essential",
    "recommended",
    "warning",
    "overall",
    "conclusion",
];

/// Default Jaccard similarity above which two sentences are duplicates.
pub const DEDUPE_THRESHOLD: f64 = 0.6;

fn score_sentence(sentence: &str, query_words: &HashSet<String>) -> f64 {
    let words = content_words(sentence);
    let mut score = 0.0;

    if !query_words.is_empty() {
        let overlap = words.iter().filter(|w| query_words.contains(*w)).count();
        score += 3.0 * (overlap as f64 / query_words.len() as f64).min(1.0);
    }

    let number_hits = NUMBER.find_iter(sentence).count().min(2);
    score += 0.5 * number_hits as f64;

    let lower = sentence.to_lowercase();
    if SIGNAL_WORDS.iter().any(|s| lower.contains(s)) {
        score += 1.0;
    }

    if (60..=300).contains(&sentence.len()) {
        score += 0.5;
    }

    score
}

/// Rank sentences against a query and return the top `limit`, original
/// order preserved among the winners.
pub fn extract_key_points(content: &str, query: &str, limit: usize) -> Vec<String> {
    let query_words: HashSet<String> = content_words(query).into_iter().collect();
    let sentences = split_sentences(content);

    let mut scored: Vec<(usize, f64, &String)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| (i, score_sentence(s, &query_words), s))
        .filter(|(_, score, _)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored.sort_by_key(|(i, _, _)| *i);

    dedupe_sentences(
        scored.into_iter().map(|(_, _, s)| s.clone()).collect(),
        DEDUPE_THRESHOLD,
    )
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Remove near-duplicate sentences by Jaccard similarity over word sets,
/// keeping the longer of each pair.
pub fn dedupe_sentences(sentences: Vec<String>, threshold: f64) -> Vec<String> {
    let sets: Vec<HashSet<String>> = sentences
        .iter()
        .map(|s| content_words(s).into_iter().collect())
        .collect();

    let mut keep = vec![true; sentences.len()];
    for i in 0..sentences.len() {
        if !keep[i] {
            continue;
        }
        for j in (i + 1)..sentences.len() {
            if !keep[j] {
                continue;
            }
            if jaccard(&sets[i], &sets[j]) >= threshold {
                // Drop the shorter one.
                if sentences[j].len() > sentences[i].len() {
                    keep[i] = false;
                    break;
                } else {
                    keep[j] = false;
                }
            }
        }
    }

    sentences
        .into_iter()
        .zip(keep)
        .filter_map(|(s, k)| k.then_some(s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_relevant_sentences_win() {
        let content = "The weather today is quite pleasant outside. \
            Rust ownership rules prevent data races at compile time. \
            Lunch options nearby include several cafes and diners.";
        let points = extract_key_points(content, "rust ownership races", 1);
        assert_eq!(points.len(), 1);
        assert!(points[0].contains("ownership"));
    }

    #[test]
    fn signal_words_and_numbers_boost() {
        let content = "Something vague happened at some point somewhere around here. \
            Important: latency dropped 40 percent across 12 regions last quarter.";
        let points = extract_key_points(content, "", 1);
        assert!(points[0].contains("Important"));
    }

    #[test]
    fn limit_is_respected() {
        let content = "One important fact stands out clearly here today. \
            Another important fact stands near the second position. \
            A third important fact closes out the list entirely.";
        let points = extract_key_points(content, "fact", 2);
        assert!(points.len() <= 2);
    }

    #[test]
    fn near_duplicates_keep_the_longer_sentence() {
        let out = dedupe_sentences(
            vec![
                "rust compiles fast binaries today".to_string(),
                "rust compiles very fast binaries today overall".to_string(),
                "completely different topic sentence".to_string(),
            ],
            0.6,
        );
        assert_eq!(out.len(), 2);
        assert!(out[0].contains("very fast"));
    }

    #[test]
    fn empty_content_returns_empty() {
        assert!(extract_key_points("", "query", 5).is_empty());
    }
}
