//! Structured-extraction dispatch.
//!
//! `selectors` runs direct CSS extraction; `schema`/`prompt` goes to the
//! configured extraction engine when one is wired, and otherwise to the
//! heuristic auto-extractor so keyless deployments still get typed data.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;
use webpeel_extraction::heuristics::auto_extract;
use webpeel_types::{ExtractSpec, PeelError};

/// An LLM-style extraction backend. Provider wire formats live outside
/// the core; this is the only seam it sees.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    async fn extract(
        &self,
        content: &str,
        schema: Option<&Value>,
        prompt: Option<&str>,
    ) -> Result<Value, PeelError>;
}

pub(crate) async fn run_extraction(
    engine: Option<&dyn ExtractionEngine>,
    spec: &ExtractSpec,
    url: &Url,
    html: &str,
    content: &str,
) -> Result<Value, PeelError> {
    if let Some(selectors) = &spec.selectors {
        return Ok(extract_by_selectors(html, selectors));
    }

    match engine {
        Some(engine) => {
            engine
                .extract(content, spec.schema.as_ref(), spec.prompt.as_deref())
                .await
        }
        None => {
            debug!("no extraction engine configured; using heuristic auto-extract");
            Ok(auto_extract(url, html, content))
        }
    }
}

fn extract_by_selectors(
    html: &str,
    selectors: &std::collections::HashMap<String, String>,
) -> Value {
    let doc = Html::parse_document(html);
    let mut out = serde_json::Map::new();
    for (field, raw) in selectors {
        let value = Selector::parse(raw)
            .ok()
            .and_then(|selector| {
                doc.select(&selector).next().map(|el| {
                    el.text()
                        .collect::<String>()
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                })
            })
            .map(Value::String)
            .unwrap_or(Value::Null);
        out.insert(field.clone(), value);
    }
    json!({ "fields": Value::Object(out) })
}
