//! The fetch→extract pipeline behind `peel`.

use crate::extract::{run_extraction, ExtractionEngine};
use std::time::Instant;
use tracing::debug;
use url::Url;
use webpeel_extraction as extraction;
use webpeel_fetch::{FetchError, SmartFetcher};
use webpeel_tracking::ChangeTracker;
use webpeel_types::{FetchResult, OutputFormat, PeelError, PeelOptions, PeelResult};

pub(crate) async fn fetch_and_extract(
    fetcher: &SmartFetcher,
    tracker: &ChangeTracker,
    engine: Option<&dyn ExtractionEngine>,
    url: &Url,
    options: &PeelOptions,
) -> Result<PeelResult, PeelError> {
    let started = Instant::now();

    let fetched = fetcher
        .smart_fetch(url.as_str(), options)
        .await
        .map_err(|e| map_fetch_error(url.as_str(), e))?;

    let mut result = extract_from_fetch(&fetched, url, options);

    if options.change_tracking {
        let fingerprint64 = extraction::fingerprint64(&result.content);
        match tracker
            .track(url.as_str(), &result.content, &fingerprint64)
            .await
        {
            Ok(summary) => result.change_status = Some(summary),
            Err(e) => {
                // Snapshot trouble reads as "no prior"; the peel itself
                // still succeeds.
                debug!(url = %url, error = %e, "change tracking unavailable");
            }
        }
    }

    if let Some(spec) = &options.extract {
        result.extracted =
            Some(run_extraction(engine, spec, url, &fetched.html, &result.content).await?);
    }

    result.elapsed = started.elapsed().as_millis() as u64;
    Ok(result)
}

/// Pure extraction stage: HTML in, `PeelResult` out. `elapsed`,
/// `change_status` and `extracted` are filled by the caller.
pub(crate) fn extract_from_fetch(
    fetched: &FetchResult,
    url: &Url,
    options: &PeelOptions,
) -> PeelResult {
    let html = &fetched.html;
    let exclude = options.all_exclude_selectors();

    // Region selection: an explicit selector (or include list) overrides
    // the main-content detector.
    let mut include = Vec::new();
    if let Some(selector) = &options.selector {
        include.push(selector.clone());
    }
    include.extend(options.include_tags.iter().cloned());

    let region = if include.is_empty() {
        let main = extraction::detect_main_content(html);
        extraction::filter_by_tags(&main.html, &[], &exclude)
    } else {
        extraction::filter_by_tags(html, &include, &exclude)
    };

    let content = match options.format {
        OutputFormat::Html => region.trim().to_string(),
        OutputFormat::Markdown => {
            let markdown = extraction::html_to_markdown(&region);
            if options.raw {
                markdown
            } else {
                extraction::clean_markdown_noise(&markdown)
            }
        }
        OutputFormat::Text => {
            let markdown = extraction::html_to_markdown(&region);
            let markdown = if options.raw {
                markdown
            } else {
                extraction::clean_markdown_noise(&markdown)
            };
            extraction::markdown_to_text(&markdown)
        }
        OutputFormat::Clean => {
            extraction::clean_for_ai(&extraction::html_to_markdown(&region))
        }
    };

    let (title, mut metadata) = extraction::extract_metadata(html);
    metadata.fetched_at = Some(chrono::Utc::now());
    metadata.method = Some(fetched.method);

    let links = extraction::extract_links(html, url);
    let images = options
        .images
        .then(|| extraction::extract_images(html, url));

    let content = match options.max_tokens {
        Some(budget) => extraction::truncate_to_tokens(&content, budget),
        None => content,
    };

    PeelResult {
        url: fetched.url.clone(),
        title,
        fingerprint: extraction::fingerprint16(&content),
        quality: extraction::quality_score(&content, html.len()),
        tokens: extraction::estimate_tokens(&content),
        content,
        method: fetched.method,
        elapsed: 0,
        metadata,
        links,
        images,
        screenshot: fetched.screenshot.clone(),
        content_type: fetched.content_type.clone(),
        status_code: fetched.status_code,
        extracted: None,
        change_status: None,
        challenge_detected: fetched.challenge_detected,
    }
}

fn map_fetch_error(url: &str, e: FetchError) -> PeelError {
    match e {
        FetchError::Timeout { .. } => PeelError::Timeout {
            operation: format!("fetch {}", url),
        },
        other => PeelError::fetch(url, other.to_string()),
    }
}
