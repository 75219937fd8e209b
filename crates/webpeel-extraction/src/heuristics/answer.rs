//! BM25-ranked quick answers over page content.

use super::{content_words, split_sentences};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;
/// Question-type boost added on top of the BM25 score.
const BOOST: f64 = 0.5;
const DEFAULT_TOP_K: usize = 3;

static HAS_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());
static HAS_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{4}|January|February|March|April|May|June|July|August|September|October|November|December|Q[1-4])\b").unwrap()
});
static DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:is|are|refers to|means|defined as)\b").unwrap());
static CAUSAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:because|due to|caused by|as a result|therefore|since)\b").unwrap());

/// A ranked passage with one sentence of surrounding context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// The passage with its neighboring sentences.
    pub context: String,
    pub score: f64,
}

/// Result of a quick-answer query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickAnswer {
    pub passages: Vec<Passage>,
    /// Best score normalized by the theoretical maximum, in [0, 1].
    pub confidence: f64,
}

impl QuickAnswer {
    pub fn empty() -> Self {
        Self {
            passages: Vec::new(),
            confidence: 0.0,
        }
    }

    /// The best passage text, if any.
    pub fn best(&self) -> Option<&str> {
        self.passages.first().map(|p| p.text.as_str())
    }
}

/// Answer a question against content using BM25 over sentences, with
/// question-type boosts, returning the top passages and a confidence.
pub fn quick_answer(question: &str, content: &str, top_k: Option<usize>) -> QuickAnswer {
    let top_k = top_k.unwrap_or(DEFAULT_TOP_K);
    let sentences = split_sentences(content);
    let query_terms = content_words(question);
    if sentences.is_empty() || query_terms.is_empty() {
        return QuickAnswer::empty();
    }

    let tokenized: Vec<Vec<String>> = sentences.iter().map(|s| content_words(s)).collect();
    let n = tokenized.len() as f64;
    let avgdl = tokenized.iter().map(Vec::len).sum::<usize>() as f64 / n;

    // Document frequency per query term.
    let mut df: HashMap<&str, f64> = HashMap::new();
    for term in &query_terms {
        let count = tokenized
            .iter()
            .filter(|doc| doc.iter().any(|w| w == term))
            .count() as f64;
        df.insert(term.as_str(), count);
    }
    let idf = |term: &str| -> f64 {
        let d = df.get(term).copied().unwrap_or(0.0);
        ((n - d + 0.5) / (d + 0.5) + 1.0).ln()
    };

    let question_lower = question.to_lowercase();
    let wants_number =
        question_lower.contains("how many") || question_lower.contains("how much");
    let wants_date = question_lower.contains("when");
    let wants_definition = question_lower.contains("what is");
    let wants_cause = question_lower.contains("why");

    let mut scored: Vec<(usize, f64)> = Vec::with_capacity(sentences.len());
    for (i, doc) in tokenized.iter().enumerate() {
        let dl = doc.len() as f64;
        let mut score = 0.0;
        for term in &query_terms {
            let tf = doc.iter().filter(|w| *w == term).count() as f64;
            if tf == 0.0 {
                continue;
            }
            let denom = tf + K1 * (1.0 - B + B * dl / avgdl);
            score += idf(term) * (tf * (K1 + 1.0)) / denom;
        }
        if score <= 0.0 {
            continue;
        }
        let sentence = &sentences[i];
        if wants_number && HAS_NUMBER.is_match(sentence) {
            score += BOOST;
        }
        if wants_date && HAS_DATE.is_match(sentence) {
            score += BOOST;
        }
        if wants_definition && DEFINITION.is_match(sentence) {
            score += BOOST;
        }
        if wants_cause && CAUSAL.is_match(sentence) {
            score += BOOST;
        }
        scored.push((i, score));
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    // Theoretical max: every query term at saturation plus all boosts.
    let max_possible: f64 =
        query_terms.iter().map(|t| idf(t) * (K1 + 1.0)).sum::<f64>() + 4.0 * BOOST;
    let confidence = scored
        .first()
        .map(|(_, s)| (s / max_possible).clamp(0.0, 1.0))
        .unwrap_or(0.0);

    let passages = scored
        .into_iter()
        .map(|(i, score)| {
            let start = i.saturating_sub(1);
            let end = (i + 2).min(sentences.len());
            Passage {
                text: sentences[i].clone(),
                context: sentences[start..end].join(" "),
                score,
            }
        })
        .collect();

    QuickAnswer {
        passages,
        confidence,
    }
}
