//! Price, percentage, count and date extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$€£¥]\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:million|billion|M|B|K))?").unwrap());
static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?\s?%").unwrap());
static COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d[\d,]*(?:\.\d+)?\s?(?:million|billion|thousand|K)\b").unwrap()
});
static DATE_LONG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s\d{1,2},\s\d{4}\b").unwrap()
});
static DATE_ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap());
static DATE_QUARTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bQ[1-4]\s\d{4}\b").unwrap());

/// Per-category caps keep noisy pages from flooding the output.
const CATEGORY_CAP: usize = 5;
const DATE_CAP: usize = 10;

/// Numeric facts pulled from page text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NumberFacts {
    pub prices: Vec<String>,
    pub percentages: Vec<String>,
    pub counts: Vec<String>,
}

/// Extract prices, percentages and magnitude counts, capped per category.
pub fn extract_numbers(text: &str) -> NumberFacts {
    NumberFacts {
        prices: capped_matches(&PRICE, text, CATEGORY_CAP),
        percentages: capped_matches(&PERCENT, text, CATEGORY_CAP),
        counts: capped_matches(&COUNT, text, CATEGORY_CAP),
    }
}

/// Extract recognizable dates (long form, ISO, quarter), deduplicated and
/// capped at 10.
pub fn extract_dates(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for re in [&*DATE_LONG, &*DATE_ISO, &*DATE_QUARTER] {
        for m in re.find_iter(text) {
            let s = m.as_str().to_string();
            if !out.contains(&s) {
                out.push(s);
            }
            if out.len() >= DATE_CAP {
                return out;
            }
        }
    }
    out
}

fn capped_matches(re: &Regex, text: &str, cap: usize) -> Vec<String> {
    let mut out = Vec::new();
    for m in re.find_iter(text) {
        let s = m.as_str().trim().to_string();
        if !out.contains(&s) {
            out.push(s);
        }
        if out.len() >= cap {
            break;
        }
    }
    out
}
