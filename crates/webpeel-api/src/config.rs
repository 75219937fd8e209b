//! Environment configuration.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Postgres connection string; absent means in-memory stores
    /// (development only).
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub cors_origins: Vec<String>,
    pub environment: Environment,
    pub cf_worker_url: Option<String>,
    pub cf_worker_token: Option<String>,
    pub peeltls_endpoint: Option<String>,
    pub serper_api_key: Option<String>,
    /// Comma-separated plaintext API keys accepted in development; each
    /// is hashed at startup.
    pub dev_api_keys: Vec<String>,
    pub snapshots_dir: Option<PathBuf>,
    pub weekly_limit: u64,
    pub burst_limit: u64,
    /// Launch the headless browser tier at startup.
    pub enable_browser: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let environment = match env_var("NODE_ENV").or_else(|| env_var("WEBPEEL_ENV")).as_deref() {
            Some("production") => Environment::Production,
            _ => Environment::Development,
        };

        let jwt_secret = env_var("JWT_SECRET");
        if environment == Environment::Production && jwt_secret.is_none() {
            bail!("JWT_SECRET is required in production");
        }
        let database_url = env_var("DATABASE_URL");
        if environment == Environment::Production && database_url.is_none() {
            bail!("DATABASE_URL is required in production");
        }

        let port = env_var("PORT")
            .map(|p| p.parse::<u16>().context("PORT must be a number"))
            .transpose()?
            .unwrap_or(3000);

        Ok(Self {
            port,
            database_url,
            jwt_secret,
            cors_origins: env_var("CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            environment,
            cf_worker_url: env_var("WEBPEEL_CF_WORKER_URL"),
            cf_worker_token: env_var("WEBPEEL_CF_WORKER_TOKEN"),
            peeltls_endpoint: env_var("WEBPEEL_PEELTLS_ENDPOINT"),
            serper_api_key: env_var("SERPER_API_KEY"),
            dev_api_keys: env_var("WEBPEEL_API_KEYS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            snapshots_dir: env_var("WEBPEEL_SNAPSHOTS_DIR").map(PathBuf::from),
            weekly_limit: env_var("WEBPEEL_WEEKLY_LIMIT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(125),
            burst_limit: env_var("WEBPEEL_BURST_LIMIT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            enable_browser: env_var("WEBPEEL_ENABLE_BROWSER")
                .map(|v| v != "0" && v != "false")
                .unwrap_or(false),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
