//! Quota accounting for WebPeel.
//!
//! Usage is tracked per API key in two windows: an ISO-week pool with
//! rollover credits from the previous week, and an hourly burst bucket
//! that hard-blocks. Exhausting the weekly pool either charges
//! pay-as-you-go extra usage or soft-limits the request (the caller
//! downgrades it rather than rejecting).

mod engine;
mod memory;
mod pg;
mod time;

pub use engine::{QuotaConfig, QuotaEngine};
pub use memory::MemoryUsageStore;
pub use pg::PgUsageStore;
pub use time::{hour_label, iso_week_label, next_week_reset, previous_week_label, seconds_to_next_hour};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("quota store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for QuotaError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e.to_string())
    }
}

/// Billing class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageClass {
    Basic,
    Stealth,
    Captcha,
    Search,
}

impl UsageClass {
    /// Pay-as-you-go price per request, in dollars.
    pub fn rate(&self) -> f64 {
        match self {
            Self::Basic => 0.002,
            Self::Stealth => 0.01,
            Self::Captcha => 0.02,
            Self::Search => 0.001,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Stealth => "stealth",
            Self::Captcha => "captcha",
            Self::Search => "search",
        }
    }
}

/// Weekly counters for one (api key, week) bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyUsage {
    pub basic: u64,
    pub stealth: u64,
    pub captcha: u64,
    pub search: u64,
    /// Set once per week on first access; never recomputed within the
    /// week.
    pub rollover_credits: Option<u64>,
}

impl WeeklyUsage {
    pub fn total(&self) -> u64 {
        self.basic + self.stealth + self.captcha + self.search
    }
}

/// Pay-as-you-go state for the key's owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraUsage {
    pub enabled: bool,
    pub balance: f64,
    pub spent: f64,
    pub spending_limit: f64,
    pub auto_reload: bool,
}

impl ExtraUsage {
    /// Whether another charge may be drawn from this account.
    pub fn can_charge(&self) -> bool {
        self.enabled && self.balance > 0.0 && self.spent < self.spending_limit
    }
}

/// Hourly burst window status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstInfo {
    pub limit: u64,
    pub used: u64,
    pub remaining: u64,
    /// Seconds until the hourly bucket resets.
    pub resets_in_secs: u64,
}

/// Weekly pool status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyInfo {
    pub limit: u64,
    pub used: u64,
    pub rollover_credits: u64,
    pub total_available: u64,
    pub remaining: u64,
    pub percent_used: f64,
    pub resets_at: DateTime<Utc>,
}

/// What to do with the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum QuotaOutcome {
    /// Within quota; proceed normally.
    Allowed,
    /// Over weekly quota but charged from extra usage.
    AllowedExtraUsage { charged: f64 },
    /// Over weekly quota with no extra usage; proceed degraded.
    SoftLimited,
    /// Over the hourly burst cap; reject.
    HardBlocked { retry_after_secs: u64 },
}

/// Full decision returned for every quota-tracked request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub outcome: QuotaOutcome,
    pub burst: BurstInfo,
    pub weekly: WeeklyInfo,
    pub extra: ExtraUsage,
}

impl QuotaDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self.outcome, QuotaOutcome::HardBlocked { .. })
    }

    pub fn is_soft_limited(&self) -> bool {
        matches!(self.outcome, QuotaOutcome::SoftLimited)
    }
}

/// Persistence behind the quota engine.
///
/// Counter increments must be atomic upserts; a concurrent
/// check-and-increment may briefly exceed the limit by the size of the
/// concurrent burst, which is acceptable.
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn weekly_usage(&self, api_key_id: &str, week: &str) -> Result<WeeklyUsage, QuotaError>;

    /// Persist rollover credits for the week unless already set.
    async fn set_rollover_if_unset(
        &self,
        api_key_id: &str,
        week: &str,
        credits: u64,
    ) -> Result<(), QuotaError>;

    async fn increment_weekly(
        &self,
        api_key_id: &str,
        week: &str,
        class: UsageClass,
    ) -> Result<(), QuotaError>;

    async fn burst_count(&self, api_key_id: &str, hour: &str) -> Result<u64, QuotaError>;

    async fn increment_burst(&self, api_key_id: &str, hour: &str) -> Result<(), QuotaError>;

    async fn extra_usage(&self, api_key_id: &str) -> Result<ExtraUsage, QuotaError>;

    /// Charge an extra-usage amount and append a log entry.
    async fn charge_extra(
        &self,
        api_key_id: &str,
        class: UsageClass,
        amount: f64,
    ) -> Result<(), QuotaError>;
}
