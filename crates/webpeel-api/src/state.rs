//! Shared application state and its assembly.

use crate::auth::{KeyStore, MemoryKeyStore, PgKeyStore};
use crate::config::AppConfig;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use webpeel_facade::WebPeel;
use webpeel_fetch::{
    BrowserFetcher, CfWorkerFetcher, ChromiumBrowser, GoogleCacheFetcher, PeelTlsFetcher,
    SmartFetchConfig, SmartFetcher,
};
use webpeel_quota::{MemoryUsageStore, PgUsageStore, QuotaConfig, QuotaEngine};
use webpeel_tracking::ChangeTracker;
use webpeel_workers::{
    JobStore, MemoryWatchStore, PgWatchStore, WatchManager, WatchStore, WebhookNotifier,
};

/// Everything the handlers share.
#[derive(Clone)]
pub struct AppState {
    pub peel: Arc<WebPeel>,
    pub jobs: Arc<JobStore>,
    pub notifier: Arc<WebhookNotifier>,
    pub quota: Arc<QuotaEngine>,
    pub keys: Arc<dyn KeyStore>,
    pub watches: Arc<dyn WatchStore>,
    pub watch_manager: Arc<WatchManager>,
    pub started_at: Instant,
    pub production: bool,
    pub cors_origins: Vec<String>,
}

impl AppState {
    /// Wire the full production object graph from configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let pool = match &config.database_url {
            Some(url) => Some(
                PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("failed to connect to Postgres")?,
            ),
            None => {
                warn!("no DATABASE_URL; using in-memory stores (development only)");
                None
            }
        };

        let mut fetcher = SmartFetcher::new(
            SmartFetchConfig::default(),
            std::time::Duration::from_secs(30),
        )
        .map_err(|e| anyhow::anyhow!("fetcher init: {}", e))?;

        if config.enable_browser {
            let engine = Arc::new(
                ChromiumBrowser::launch()
                    .await
                    .map_err(|e| anyhow::anyhow!("browser launch: {}", e))?,
            );
            fetcher = fetcher
                .with_browser(Arc::new(BrowserFetcher::new(engine.clone())))
                .with_stealth(Arc::new(BrowserFetcher::stealth(engine)));
            info!("browser tier enabled");
        }
        if let Some(worker_url) = &config.cf_worker_url {
            fetcher = fetcher.with_fallback(Arc::new(
                CfWorkerFetcher::new(worker_url.clone(), config.cf_worker_token.clone())
                    .map_err(|e| anyhow::anyhow!("cf worker init: {}", e))?,
            ));
        }
        if let Some(endpoint) = &config.peeltls_endpoint {
            fetcher = fetcher.with_fallback(Arc::new(
                PeelTlsFetcher::new(endpoint.clone())
                    .map_err(|e| anyhow::anyhow!("peeltls init: {}", e))?,
            ));
        }
        fetcher = fetcher.with_fallback(Arc::new(
            GoogleCacheFetcher::new().map_err(|e| anyhow::anyhow!("google cache init: {}", e))?,
        ));

        let tracker = match &config.snapshots_dir {
            Some(dir) => ChangeTracker::new(dir.clone()),
            None => ChangeTracker::default_location(),
        };

        let mut builder = WebPeel::builder().fetcher(fetcher).tracker(tracker);
        match webpeel_search::create_provider(config.serper_api_key.clone()) {
            Ok(provider) => builder = builder.search(provider),
            Err(e) => warn!(error = %e, "search provider unavailable"),
        }
        let peel = Arc::new(builder.build().map_err(|e| anyhow::anyhow!(e.to_string()))?);

        let quota_store: Arc<dyn webpeel_quota::UsageStore> = match &pool {
            Some(pool) => Arc::new(PgUsageStore::new(pool.clone())),
            None => Arc::new(MemoryUsageStore::new()),
        };
        let quota = Arc::new(QuotaEngine::new(
            quota_store,
            QuotaConfig {
                weekly_limit: config.weekly_limit,
                burst_limit: config.burst_limit,
            },
        ));

        let keys: Arc<dyn KeyStore> = match &pool {
            Some(pool) => Arc::new(PgKeyStore::new(pool.clone())),
            None => MemoryKeyStore::seeded(&config.dev_api_keys),
        };

        let watches: Arc<dyn WatchStore> = match &pool {
            Some(pool) => Arc::new(PgWatchStore::new(pool.clone())),
            None => Arc::new(MemoryWatchStore::new()),
        };

        let notifier = Arc::new(WebhookNotifier::new());
        let watch_manager = Arc::new(WatchManager::new(
            Arc::clone(&watches),
            peel.clone(),
            Arc::clone(&notifier),
        ));

        Ok(Self {
            peel,
            jobs: Arc::new(JobStore::new()),
            notifier,
            quota,
            keys,
            watches,
            watch_manager,
            started_at: Instant::now(),
            production: config.is_production(),
            cors_origins: config.cors_origins.clone(),
        })
    }

    /// Minimal state over in-memory stores for tests.
    pub fn for_tests(peel: Arc<WebPeel>, keys: Arc<dyn KeyStore>) -> Self {
        let watches: Arc<dyn WatchStore> = Arc::new(MemoryWatchStore::new());
        let notifier = Arc::new(WebhookNotifier::new());
        let watch_manager = Arc::new(WatchManager::new(
            Arc::clone(&watches),
            peel.clone(),
            Arc::clone(&notifier),
        ));
        Self {
            peel,
            jobs: Arc::new(JobStore::new()),
            notifier,
            quota: Arc::new(QuotaEngine::new(
                Arc::new(MemoryUsageStore::new()),
                QuotaConfig::default(),
            )),
            keys,
            watches,
            watch_manager,
            started_at: Instant::now(),
            production: false,
            cors_origins: Vec::new(),
        }
    }
}
