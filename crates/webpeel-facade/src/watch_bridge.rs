//! Bridges the watch manager onto the peel pipeline.

use crate::WebPeel;
use async_trait::async_trait;
use webpeel_extraction::fingerprint64;
use webpeel_types::{OutputFormat, PeelOptions};
use webpeel_workers::{WatchError, WatchFetcher, WatchObservation};

/// Watch checks run a full peel with change tracking so snapshots and
/// diffs share the rest of the system's view of the page.
#[async_trait]
impl WatchFetcher for WebPeel {
    async fn observe(
        &self,
        url: &str,
        selector: Option<&str>,
    ) -> Result<WatchObservation, WatchError> {
        let previous_content = self
            .tracker()
            .get_snapshot(url)
            .await
            .map(|snapshot| snapshot.content);

        let options = PeelOptions {
            format: OutputFormat::Markdown,
            selector: selector.map(str::to_string),
            change_tracking: true,
            timeout_ms: 30_000,
            ..Default::default()
        };
        let result = self
            .peel(url, &options)
            .await
            .map_err(|e| WatchError::Fetch(e.to_string()))?;

        Ok(WatchObservation {
            fingerprint: fingerprint64(&result.content),
            content: result.content,
            previous_content,
        })
    }
}
