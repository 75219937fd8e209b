//! The tiered escalation engine.
//!
//! `smart_fetch` walks simple HTTP → browser → stealth → configured
//! fallbacks, consulting domain intelligence for a starting tier and
//! detecting bot challenges at every step. When every source serves a
//! challenge page, the best HTML obtained is returned flagged rather
//! than failing the request.

use crate::domain::DomainIntel;
use crate::error::FetchError;
use crate::simple::SimpleFetcher;
use crate::FetchStrategy;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use webpeel_types::{FetchMethod, FetchResult, PeelOptions};

/// Escalation-engine tuning.
#[derive(Debug, Clone)]
pub struct SmartFetchConfig {
    /// Start a parallel browser fetch when the simple tier has not
    /// resolved within the grace window.
    pub race_enabled: bool,
    pub race_timeout_ms: u64,
}

impl Default for SmartFetchConfig {
    fn default() -> Self {
        Self {
            race_enabled: false,
            race_timeout_ms: 2_000,
        }
    }
}

/// Plugin surface consulted by the engine. The default no-hook path is
/// pure base escalation.
#[async_trait]
pub trait FetchHooks: Send + Sync {
    /// Pre-fetch cache probe. A hit short-circuits the escalation.
    async fn cache_lookup(&self, _url: &str, _options: &PeelOptions) -> Option<FetchResult> {
        None
    }

    /// Post-fetch cache write.
    async fn cache_store(&self, _url: &str, _options: &PeelOptions, _result: &FetchResult) {}

    /// Starting-method override; takes precedence over the built-in
    /// domain intelligence.
    fn recommend(&self, _url: &str) -> Option<FetchMethod> {
        None
    }

    /// Outcome notification alongside the built-in recording.
    fn record(&self, _url: &str, _method: FetchMethod, _success: bool) {}

    /// Per-request race-policy override.
    fn race_enabled(&self, _options: &PeelOptions) -> Option<bool> {
        None
    }
}

/// The default, no-op hook set.
pub struct NoHooks;

#[async_trait]
impl FetchHooks for NoHooks {}

/// Escalating fetcher over the registered strategies.
pub struct SmartFetcher {
    simple: Arc<dyn FetchStrategy>,
    browser: Option<Arc<dyn FetchStrategy>>,
    stealth: Option<Arc<dyn FetchStrategy>>,
    fallbacks: Vec<Arc<dyn FetchStrategy>>,
    domains: Arc<DomainIntel>,
    hooks: Arc<dyn FetchHooks>,
    config: SmartFetchConfig,
}

impl SmartFetcher {
    /// Engine with the real simple tier and no rendered tiers; browser,
    /// stealth and fallbacks are attached by the composition root.
    pub fn new(config: SmartFetchConfig, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self::with_simple(
            Arc::new(SimpleFetcher::new(timeout)?),
            config,
        ))
    }

    /// Engine over an explicit simple strategy.
    pub fn with_simple(simple: Arc<dyn FetchStrategy>, config: SmartFetchConfig) -> Self {
        Self {
            simple,
            browser: None,
            stealth: None,
            fallbacks: Vec::new(),
            domains: Arc::new(DomainIntel::new()),
            hooks: Arc::new(NoHooks),
            config,
        }
    }

    pub fn with_browser(mut self, browser: Arc<dyn FetchStrategy>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn with_stealth(mut self, stealth: Arc<dyn FetchStrategy>) -> Self {
        self.stealth = Some(stealth);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FetchStrategy>) -> Self {
        self.fallbacks.push(fallback);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn FetchHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn domains(&self) -> Arc<DomainIntel> {
        Arc::clone(&self.domains)
    }

    fn record(&self, url: &str, method: FetchMethod, success: bool) {
        self.domains.record(url, method, success);
        self.hooks.record(url, method, success);
    }

    /// A result worth returning without further escalation: no challenge
    /// and not a server error. 4xx responses are definitive answers.
    fn is_acceptable(result: &FetchResult) -> bool {
        !result.challenge_detected && result.status_code < 500
    }

    /// Fetch a page, escalating through tiers as needed.
    pub async fn smart_fetch(
        &self,
        url: &str,
        options: &PeelOptions,
    ) -> Result<FetchResult, FetchError> {
        if let Some(hit) = self.hooks.cache_lookup(url, options).await {
            debug!(url, "smart fetch served from hook cache");
            return Ok(hit);
        }

        let recommendation = self
            .hooks
            .recommend(url)
            .or_else(|| self.domains.recommend(url));
        if let Some(method) = recommendation {
            debug!(url, method = %method, "starting tier recommended by history");
        }

        let force_stealth = options.stealth || recommendation == Some(FetchMethod::Stealth);
        let skip_simple = options.needs_render()
            || matches!(
                recommendation,
                Some(FetchMethod::Browser) | Some(FetchMethod::Stealth)
            );

        let mut best_challenge: Option<FetchResult> = None;
        let mut last_error: Option<FetchError> = None;

        if !skip_simple {
            match self.simple_tier(url, options).await {
                Ok(result) if Self::is_acceptable(&result) => {
                    self.record(url, result.method, result.status_code < 400);
                    self.hooks.cache_store(url, options, &result).await;
                    return Ok(result);
                }
                Ok(result) => {
                    debug!(url, status = result.status_code, "simple tier blocked, escalating");
                    self.record(url, result.method, false);
                    keep_best(&mut best_challenge, result);
                }
                Err(e) => {
                    debug!(url, error = %e, "simple tier failed, escalating");
                    self.record(url, FetchMethod::Simple, false);
                    last_error = Some(e);
                }
            }
        }

        let mut rendered_tiers: Vec<&Arc<dyn FetchStrategy>> = Vec::new();
        if !force_stealth {
            if let Some(browser) = &self.browser {
                rendered_tiers.push(browser);
            }
        }
        if let Some(stealth) = &self.stealth {
            rendered_tiers.push(stealth);
        }

        for tier in rendered_tiers {
            match tier.fetch(url, options).await {
                Ok(result) if Self::is_acceptable(&result) => {
                    self.record(url, result.method, true);
                    self.hooks.cache_store(url, options, &result).await;
                    return Ok(result);
                }
                Ok(result) => {
                    debug!(url, tier = tier.name(), "rendered tier hit a challenge");
                    self.record(url, result.method, false);
                    keep_best(&mut best_challenge, result);
                }
                Err(e) => {
                    warn!(url, tier = tier.name(), error = %e, "rendered tier failed");
                    self.record(url, tier.method(), false);
                    last_error = Some(e);
                }
            }
        }

        for fallback in &self.fallbacks {
            match fallback.fetch(url, options).await {
                Ok(result) if Self::is_acceptable(&result) => {
                    info!(url, source = fallback.name(), "fallback source succeeded");
                    self.hooks.cache_store(url, options, &result).await;
                    return Ok(result);
                }
                Ok(result) => keep_best(&mut best_challenge, result),
                Err(e) => {
                    debug!(url, source = fallback.name(), error = %e, "fallback failed");
                    last_error = Some(e);
                }
            }
        }

        if let Some(mut best) = best_challenge {
            warn!(url, "every source served a challenge page; returning best HTML");
            best.challenge_detected = true;
            return Ok(best);
        }
        Err(last_error.unwrap_or(FetchError::NotConfigured { strategy: "fetch" }))
    }

    /// Simple tier, optionally racing a browser fetch after the grace
    /// window. The first usable result wins; the loser is dropped.
    async fn simple_tier(
        &self,
        url: &str,
        options: &PeelOptions,
    ) -> Result<FetchResult, FetchError> {
        let race = self
            .hooks
            .race_enabled(options)
            .unwrap_or(self.config.race_enabled);
        let browser = match (&self.browser, race) {
            (Some(browser), true) => Arc::clone(browser),
            _ => return self.simple.fetch(url, options).await,
        };

        let simple_fut = self.simple.fetch(url, options);
        tokio::pin!(simple_fut);

        tokio::select! {
            result = &mut simple_fut => result,
            _ = tokio::time::sleep(Duration::from_millis(self.config.race_timeout_ms)) => {
                debug!(url, "simple tier slow; racing browser");
                let browser_fut = browser.fetch(url, options);
                tokio::pin!(browser_fut);
                tokio::select! {
                    simple = &mut simple_fut => {
                        match simple {
                            Ok(ref r) if Self::is_acceptable(r) => simple,
                            _ => browser_fut.await.or(simple),
                        }
                    }
                    rendered = &mut browser_fut => {
                        match rendered {
                            Ok(ref r) if Self::is_acceptable(r) => rendered,
                            _ => simple_fut.await.or(rendered),
                        }
                    }
                }
            }
        }
    }
}

fn keep_best(best: &mut Option<FetchResult>, candidate: FetchResult) {
    let better = match best {
        Some(current) => candidate.html.len() > current.html.len(),
        None => true,
    };
    if better {
        *best = Some(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scriptable strategy stub.
    struct Scripted {
        method: FetchMethod,
        outcome: Outcome,
        delay_ms: u64,
        calls: AtomicUsize,
    }

    enum Outcome {
        Success(&'static str),
        Challenge(&'static str),
        Fail,
    }

    impl Scripted {
        fn new(method: FetchMethod, outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                method,
                outcome,
                delay_ms: 0,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(method: FetchMethod, outcome: Outcome, delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                method,
                outcome,
                delay_ms,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FetchStrategy for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn method(&self) -> FetchMethod {
            self.method
        }

        async fn fetch(
            &self,
            url: &str,
            _options: &PeelOptions,
        ) -> Result<FetchResult, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            match &self.outcome {
                Outcome::Success(html) => Ok(FetchResult::new(url, *html, self.method)),
                Outcome::Challenge(html) => {
                    let mut r = FetchResult::new(url, *html, self.method);
                    r.challenge_detected = true;
                    Ok(r)
                }
                Outcome::Fail => Err(FetchError::Network {
                    url: url.to_string(),
                    message: "refused".into(),
                }),
            }
        }
    }

    const URL: &str = "https://site.test/page";

    #[tokio::test]
    async fn simple_success_never_escalates() {
        let simple = Scripted::new(FetchMethod::Simple, Outcome::Success("<html>ok</html>"));
        let browser = Scripted::new(FetchMethod::Browser, Outcome::Success("<html>b</html>"));
        let fetcher = SmartFetcher::with_simple(simple.clone(), SmartFetchConfig::default())
            .with_browser(browser.clone());

        let result = fetcher.smart_fetch(URL, &PeelOptions::default()).await.unwrap();
        assert_eq!(result.method, FetchMethod::Simple);
        assert_eq!(browser.calls(), 0);
    }

    #[tokio::test]
    async fn challenge_escalates_to_browser() {
        let simple = Scripted::new(FetchMethod::Simple, Outcome::Challenge("<html>wall</html>"));
        let browser = Scripted::new(FetchMethod::Browser, Outcome::Success("<html>real</html>"));
        let fetcher = SmartFetcher::with_simple(simple, SmartFetchConfig::default())
            .with_browser(browser.clone());

        let result = fetcher.smart_fetch(URL, &PeelOptions::default()).await.unwrap();
        assert_eq!(result.method, FetchMethod::Browser);
        assert_eq!(browser.calls(), 1);
    }

    #[tokio::test]
    async fn render_option_skips_the_simple_tier() {
        let simple = Scripted::new(FetchMethod::Simple, Outcome::Success("<html>s</html>"));
        let browser = Scripted::new(FetchMethod::Browser, Outcome::Success("<html>b</html>"));
        let fetcher = SmartFetcher::with_simple(simple.clone(), SmartFetchConfig::default())
            .with_browser(browser);

        let options = PeelOptions {
            render: true,
            ..Default::default()
        };
        let result = fetcher.smart_fetch(URL, &options).await.unwrap();
        assert_eq!(result.method, FetchMethod::Browser);
        assert_eq!(simple.calls(), 0);
    }

    #[tokio::test]
    async fn stealth_option_skips_plain_browser() {
        let simple = Scripted::new(FetchMethod::Simple, Outcome::Success("<html>s</html>"));
        let browser = Scripted::new(FetchMethod::Browser, Outcome::Success("<html>b</html>"));
        let stealth = Scripted::new(FetchMethod::Stealth, Outcome::Success("<html>st</html>"));
        let fetcher = SmartFetcher::with_simple(simple, SmartFetchConfig::default())
            .with_browser(browser.clone())
            .with_stealth(stealth);

        let options = PeelOptions {
            stealth: true,
            ..Default::default()
        };
        let result = fetcher.smart_fetch(URL, &options).await.unwrap();
        assert_eq!(result.method, FetchMethod::Stealth);
        assert_eq!(browser.calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_tiers_fall_back_in_order() {
        let simple = Scripted::new(FetchMethod::Simple, Outcome::Fail);
        let browser = Scripted::new(FetchMethod::Browser, Outcome::Fail);
        let worker = Scripted::new(FetchMethod::CfWorker, Outcome::Fail);
        let cache = Scripted::new(FetchMethod::GoogleCache, Outcome::Success("<html>c</html>"));
        let fetcher = SmartFetcher::with_simple(simple, SmartFetchConfig::default())
            .with_browser(browser)
            .with_fallback(worker.clone())
            .with_fallback(cache.clone());

        let result = fetcher.smart_fetch(URL, &PeelOptions::default()).await.unwrap();
        assert_eq!(result.method, FetchMethod::GoogleCache);
        assert_eq!(worker.calls(), 1);
    }

    #[tokio::test]
    async fn all_challenges_return_best_html_flagged() {
        let simple = Scripted::new(FetchMethod::Simple, Outcome::Challenge("<html>tiny</html>"));
        let browser = Scripted::new(
            FetchMethod::Browser,
            Outcome::Challenge("<html>much longer challenge capture</html>"),
        );
        let fetcher =
            SmartFetcher::with_simple(simple, SmartFetchConfig::default()).with_browser(browser);

        let result = fetcher.smart_fetch(URL, &PeelOptions::default()).await.unwrap();
        assert!(result.challenge_detected);
        assert!(result.html.contains("much longer"));
    }

    #[tokio::test]
    async fn total_failure_surfaces_the_last_error() {
        let simple = Scripted::new(FetchMethod::Simple, Outcome::Fail);
        let fetcher = SmartFetcher::with_simple(simple, SmartFetchConfig::default());
        assert!(fetcher.smart_fetch(URL, &PeelOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn race_lets_browser_win_when_simple_stalls() {
        let simple = Scripted::slow(
            FetchMethod::Simple,
            Outcome::Success("<html>slow</html>"),
            500,
        );
        let browser = Scripted::new(FetchMethod::Browser, Outcome::Success("<html>fast</html>"));
        let fetcher = SmartFetcher::with_simple(
            simple,
            SmartFetchConfig {
                race_enabled: true,
                race_timeout_ms: 20,
            },
        )
        .with_browser(browser);

        let result = fetcher.smart_fetch(URL, &PeelOptions::default()).await.unwrap();
        assert_eq!(result.method, FetchMethod::Browser);
    }

    #[tokio::test]
    async fn race_prefers_simple_when_it_resolves_in_time() {
        let simple = Scripted::new(FetchMethod::Simple, Outcome::Success("<html>quick</html>"));
        let browser = Scripted::new(FetchMethod::Browser, Outcome::Success("<html>b</html>"));
        let fetcher = SmartFetcher::with_simple(
            simple,
            SmartFetchConfig {
                race_enabled: true,
                race_timeout_ms: 1_000,
            },
        )
        .with_browser(browser.clone());

        let result = fetcher.smart_fetch(URL, &PeelOptions::default()).await.unwrap();
        assert_eq!(result.method, FetchMethod::Simple);
        assert_eq!(browser.calls(), 0);
    }

    #[tokio::test]
    async fn repeated_simple_failures_teach_the_domain_store() {
        let simple = Scripted::new(FetchMethod::Simple, Outcome::Fail);
        let browser = Scripted::new(FetchMethod::Browser, Outcome::Success("<html>b</html>"));
        let fetcher = SmartFetcher::with_simple(simple.clone(), SmartFetchConfig::default())
            .with_browser(browser);

        for _ in 0..3 {
            let _ = fetcher.smart_fetch(URL, &PeelOptions::default()).await;
        }
        // History now recommends the browser, so simple is skipped.
        let before = simple.calls();
        let _ = fetcher.smart_fetch(URL, &PeelOptions::default()).await;
        assert_eq!(simple.calls(), before);
    }
}
