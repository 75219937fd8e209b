//! Request options for peel operations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Output format for extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown with headings, lists, links and tables preserved.
    #[default]
    Markdown,
    /// Plain text with all markup flattened.
    Text,
    /// The filtered HTML region, unconverted.
    Html,
    /// Markdown additionally cleaned for LLM consumption.
    Clean,
}

/// Geographic hints applied to rendered fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Ordered `Accept-Language` preference list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
}

/// A single browser step executed in order after navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BrowserAction {
    Click { selector: String },
    Fill { selector: String, value: String },
    Press { key: String },
    Wait { ms: u64 },
    Scroll {
        /// Pixels to scroll by; scrolls to the bottom when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pixels: Option<i64>,
    },
    WaitForSelector {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
}

/// Structured-extraction request attached to a peel.
///
/// `selectors` drives direct CSS extraction; `schema`/`prompt` are handed
/// to the configured extraction engine, falling back to the heuristic
/// auto-extractor when no engine is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtractSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<HashMap<String, String>>,
}

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Immutable configuration for a single peel request.
///
/// All fields have serde defaults so partial JSON bodies deserialize into
/// a fully-populated record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeelOptions {
    pub format: OutputFormat,
    /// Force the headless-browser tier.
    pub render: bool,
    /// Force the stealth (anti-bot) tier. Implies `render`.
    pub stealth: bool,
    /// Selectors whose outer HTML is concatenated into the output.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_tags: Vec<String>,
    /// Selectors removed from the document before conversion.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_tags: Vec<String>,
    /// Single selector restricting output to one region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Additional removal selectors, merged with `exclude_tags`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    pub images: bool,
    pub screenshot: bool,
    pub screenshot_full_page: bool,
    /// Token budget for the returned content. `budget` is accepted as a
    /// synonym on input.
    #[serde(alias = "budget", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    /// Extra settle time after load, in milliseconds. Rendered tiers only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<u64>,
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Proxy rotation pool; tried in order on retry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<String>,
    pub change_tracking: bool,
    /// Skip the cleaning passes and return converter output as-is.
    pub raw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<BrowserAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractSpec>,
}

impl Default for PeelOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Markdown,
            render: false,
            stealth: false,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            selector: None,
            exclude: Vec::new(),
            images: false,
            screenshot: false,
            screenshot_full_page: false,
            max_tokens: None,
            wait: None,
            timeout_ms: default_timeout_ms(),
            user_agent: None,
            headers: HashMap::new(),
            cookies: Vec::new(),
            proxy: None,
            proxies: Vec::new(),
            change_tracking: false,
            raw: false,
            location: None,
            actions: Vec::new(),
            extract: None,
        }
    }
}

impl PeelOptions {
    /// Whether this request must go through a rendered (browser) tier.
    pub fn needs_render(&self) -> bool {
        self.render || self.stealth || self.screenshot || !self.actions.is_empty()
    }

    /// All removal selectors: `exclude_tags` followed by `exclude`.
    pub fn all_exclude_selectors(&self) -> Vec<String> {
        let mut out = self.exclude_tags.clone();
        out.extend(self.exclude.iter().cloned());
        out
    }

    /// The canonical fingerprint string for cache keying.
    ///
    /// Covers exactly the options that change rendered output. Options
    /// that do not (timeouts, default user agents, webhook plumbing) are
    /// deliberately omitted so equivalent requests share an entry. An
    /// explicitly configured user agent does participate, since sites may
    /// vary responses on it.
    pub fn cache_fingerprint(&self) -> String {
        let location = self
            .location
            .as_ref()
            .map(|l| {
                format!(
                    "{}:{}",
                    l.country.as_deref().unwrap_or(""),
                    l.languages.join(",")
                )
            })
            .unwrap_or_default();
        format!(
            "f={:?}|r={}|s={}|sel={}|inc={}|exc={}|img={}|loc={}|tok={}|ua={}|raw={}",
            self.format,
            self.render,
            self.stealth,
            self.selector.as_deref().unwrap_or(""),
            self.include_tags.join(","),
            self.all_exclude_selectors().join(","),
            self.images,
            location,
            self.max_tokens.map(|t| t.to_string()).unwrap_or_default(),
            self.user_agent.as_deref().unwrap_or(""),
            self.raw,
        )
    }
}
