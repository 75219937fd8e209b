//! Tiered fetch engine for WebPeel.
//!
//! Strategies implement [`FetchStrategy`]; the [`SmartFetcher`] escalates
//! through them (simple HTTP → browser → stealth → configured fallbacks)
//! guided by per-host [`DomainIntel`], with optional simple/browser
//! racing and bot-challenge detection at every tier.

pub mod browser;
pub mod challenge;
pub mod client;
pub mod domain;
pub mod fallback;
pub mod pdf;
pub mod simple;
pub mod smart;
pub mod stealth;

mod error;

pub use browser::{BrowserFetcher, ChromiumBrowser, HeadlessBrowser, RenderOutput, RenderRequest};
pub use challenge::looks_like_challenge;
pub use domain::{DomainIntel, DomainStats};
pub use error::FetchError;
pub use fallback::{CfWorkerFetcher, GoogleCacheFetcher, PeelTlsFetcher};
pub use simple::SimpleFetcher;
pub use smart::{FetchHooks, NoHooks, SmartFetchConfig, SmartFetcher};
pub use stealth::StealthProfile;

use async_trait::async_trait;
use webpeel_types::{FetchMethod, FetchResult, PeelOptions};

/// A single way of obtaining a page.
///
/// Strategies are registered with the [`SmartFetcher`]; the escalation
/// policy lives there, not in the strategies.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn method(&self) -> FetchMethod;
    async fn fetch(&self, url: &str, options: &PeelOptions) -> Result<FetchResult, FetchError>;
}
