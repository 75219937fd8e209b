//! Comparison-page detection and table assembly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const TRIGGERS: &[&str] = &[
    "vs",
    "versus",
    "compare",
    "comparison",
    "difference",
    "alternative",
];

static PAIR_VS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([A-Za-z0-9][\w .-]{1,40}?)\s+vs\.?\s+([A-Za-z0-9][\w.-]{1,40})").unwrap());
static PAIR_COMPARE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bcompare\s+([A-Za-z0-9][\w.-]{1,40})\s+(?:and|with|to)\s+([A-Za-z0-9][\w.-]{1,40})")
        .unwrap()
});
static PAIR_DIFFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bdifference\s+between\s+([A-Za-z0-9][\w.-]{1,40})\s+and\s+([A-Za-z0-9][\w.-]{1,40})")
        .unwrap()
});

/// Field patterns filled per entity from paragraphs mentioning it.
static FIELD_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("price", Regex::new(r"(?i)(?:[$€£¥]\s?\d[\d,]*(?:\.\d+)?(?:\s?/\s?\w+)?|free tier|free plan)").unwrap()),
        ("features", Regex::new(r"(?i)(?:features?|offers?|includes?|supports?)\s+([^.]{5,200})").unwrap()),
        ("pros", Regex::new(r"(?i)(?:pros?|advantages?|strengths?)[:\s]+([^.]{5,200})").unwrap()),
        ("cons", Regex::new(r"(?i)(?:cons?|drawbacks?|weaknesses?|limitations?)[:\s]+([^.]{5,200})").unwrap()),
        ("platform", Regex::new(r"(?i)\b(?:windows|macos|linux|android|ios|web|cloud|on-premises)(?:[,/ ]+(?:windows|macos|linux|android|ios|web|cloud|on-premises))*\b").unwrap()),
        ("rating", Regex::new(r"(?i)\d(?:\.\d)?\s?(?:/\s?5|stars?|out of 5)").unwrap()),
    ]
});

const FIELD_MAX_LEN: usize = 120;

/// A comparison table keyed by compared entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub entities: Vec<String>,
    /// entity → column → value ("N/A" when nothing matched).
    pub rows: HashMap<String, HashMap<String, String>>,
}

/// Detect a comparison request and assemble the table, or `None` when the
/// query carries no comparison trigger or no entity pair is found.
pub fn detect_comparison(query: &str, content: &str) -> Option<ComparisonTable> {
    let lower = query.to_lowercase();
    let triggered = TRIGGERS
        .iter()
        .any(|t| lower.split_whitespace().any(|w| w.trim_matches('.') == *t) || lower.contains(t));
    if !triggered {
        return None;
    }

    let entities = extract_pair(query).or_else(|| extract_pair(content))?;
    let paragraphs: Vec<&str> = content
        .split("\n\n")
        .filter(|p| p.trim().len() > 10)
        .collect();

    let mut rows = HashMap::new();
    for entity in [&entities.0, &entities.1] {
        let entity_lower = entity.to_lowercase();
        let mentioning: Vec<&&str> = paragraphs
            .iter()
            .filter(|p| p.to_lowercase().contains(&entity_lower))
            .collect();

        let mut columns = HashMap::new();
        for (field, pattern) in FIELD_PATTERNS.iter() {
            let value = mentioning
                .iter()
                .find_map(|p| pattern.find(p).map(|m| m.as_str().trim().to_string()))
                .map(|v| truncate(&v, FIELD_MAX_LEN))
                .unwrap_or_else(|| "N/A".to_string());
            columns.insert(field.to_string(), value);
        }
        rows.insert(entity.clone(), columns);
    }

    Some(ComparisonTable {
        entities: vec![entities.0, entities.1],
        rows,
    })
}

fn extract_pair(text: &str) -> Option<(String, String)> {
    for re in [&*PAIR_VS, &*PAIR_COMPARE, &*PAIR_DIFFERENCE] {
        if let Some(caps) = re.captures(text) {
            let a = caps[1].trim().to_string();
            let b = caps[2].trim().trim_matches('.').to_string();
            if !a.is_empty() && !b.is_empty() && a.to_lowercase() != b.to_lowercase() {
                return Some((a, b));
            }
        }
    }
    None
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s[..cut].to_string()
}
