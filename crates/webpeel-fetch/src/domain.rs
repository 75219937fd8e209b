//! Per-host fetch-method intelligence.
//!
//! Process-local counters recording which method worked for which host.
//! Updates are atomic per host; recommendations are advisory and the
//! store is not durable for correctness.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;
use webpeel_types::FetchMethod;

/// Success/failure tallies for one host.
#[derive(Debug, Clone, Default)]
pub struct DomainStats {
    pub simple_success: u64,
    pub simple_failure: u64,
    pub browser_success: u64,
    pub browser_failure: u64,
    pub stealth_success: u64,
    pub stealth_failure: u64,
    pub last_seen: Option<DateTime<Utc>>,
}

impl DomainStats {
    fn record(&mut self, method: FetchMethod, success: bool) {
        let slot = match (method, success) {
            (FetchMethod::Simple, true) => &mut self.simple_success,
            (FetchMethod::Simple, false) => &mut self.simple_failure,
            (FetchMethod::Browser, true) => &mut self.browser_success,
            (FetchMethod::Browser, false) => &mut self.browser_failure,
            (FetchMethod::Stealth, true) => &mut self.stealth_success,
            (FetchMethod::Stealth, false) => &mut self.stealth_failure,
            // Cache hits and fallbacks teach us nothing about tiers.
            _ => return,
        };
        *slot += 1;
        self.last_seen = Some(Utc::now());
    }

    fn simple_attempts(&self) -> u64 {
        self.simple_success + self.simple_failure
    }
}

/// Process-wide per-host method tracker.
#[derive(Debug, Default)]
pub struct DomainIntel {
    hosts: DashMap<String, DomainStats>,
}

impl DomainIntel {
    pub fn new() -> Self {
        Self::default()
    }

    fn host_of(url: &str) -> Option<String> {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }

    /// Record a fetch outcome for the URL's host.
    pub fn record(&self, url: &str, method: FetchMethod, success: bool) {
        let Some(host) = Self::host_of(url) else {
            return;
        };
        self.hosts.entry(host).or_default().record(method, success);
    }

    /// Recommend a starting method for this host, or `None` when the
    /// recorded history carries no opinion.
    pub fn recommend(&self, url: &str) -> Option<FetchMethod> {
        let host = Self::host_of(url)?;
        let stats = self.hosts.get(&host)?;

        // Simple HTTP keeps failing but the browser has worked: start
        // rendered.
        let attempts = stats.simple_attempts();
        if attempts > 0
            && stats.simple_failure as f64 / attempts as f64 > 0.5
            && stats.browser_success > 0
        {
            debug!(host = %host, "recommending browser from history");
            return Some(FetchMethod::Browser);
        }

        // Rendered fetches all failed but stealth got through.
        if stats.browser_failure > 0 && stats.browser_success == 0 && stats.stealth_success > 0 {
            debug!(host = %host, "recommending stealth from history");
            return Some(FetchMethod::Stealth);
        }

        None
    }

    /// Snapshot of the stats for one host, if any.
    pub fn stats(&self, url: &str) -> Option<DomainStats> {
        let host = Self::host_of(url)?;
        self.hosts.get(&host).map(|s| s.clone())
    }

    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://tough.example.com/page";

    #[test]
    fn no_history_means_no_opinion() {
        let intel = DomainIntel::new();
        assert_eq!(intel.recommend(URL), None);
    }

    #[test]
    fn failing_simple_with_browser_success_recommends_browser() {
        let intel = DomainIntel::new();
        intel.record(URL, FetchMethod::Simple, false);
        intel.record(URL, FetchMethod::Simple, false);
        intel.record(URL, FetchMethod::Simple, true);
        intel.record(URL, FetchMethod::Browser, true);
        assert_eq!(intel.recommend(URL), Some(FetchMethod::Browser));
    }

    #[test]
    fn failed_rendering_with_stealth_success_recommends_stealth() {
        let intel = DomainIntel::new();
        intel.record(URL, FetchMethod::Browser, false);
        intel.record(URL, FetchMethod::Stealth, true);
        assert_eq!(intel.recommend(URL), Some(FetchMethod::Stealth));
    }

    #[test]
    fn mostly_successful_simple_keeps_no_opinion() {
        let intel = DomainIntel::new();
        intel.record(URL, FetchMethod::Simple, true);
        intel.record(URL, FetchMethod::Simple, true);
        intel.record(URL, FetchMethod::Simple, false);
        intel.record(URL, FetchMethod::Browser, true);
        assert_eq!(intel.recommend(URL), None);
    }

    #[test]
    fn hosts_are_tracked_independently() {
        let intel = DomainIntel::new();
        intel.record("https://a.com/x", FetchMethod::Simple, false);
        intel.record("https://a.com/y", FetchMethod::Simple, false);
        intel.record("https://a.com/z", FetchMethod::Browser, true);
        intel.record("https://b.com/x", FetchMethod::Simple, true);
        assert_eq!(intel.recommend("https://a.com/other"), Some(FetchMethod::Browser));
        assert_eq!(intel.recommend("https://b.com/other"), None);
        assert_eq!(intel.tracked_hosts(), 2);
    }

    #[test]
    fn cached_results_do_not_skew_history() {
        let intel = DomainIntel::new();
        intel.record(URL, FetchMethod::Cached, true);
        assert_eq!(intel.recommend(URL), None);
    }
}
