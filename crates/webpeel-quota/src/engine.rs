//! The quota decision engine.

use crate::time::{
    hour_label, iso_week_label, next_week_reset, previous_week_label, seconds_to_next_hour,
};
use crate::{
    BurstInfo, QuotaDecision, QuotaError, QuotaOutcome, UsageClass, UsageStore, WeeklyInfo,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Plan limits applied per API key.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub weekly_limit: u64,
    pub burst_limit: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            weekly_limit: 125,
            burst_limit: 25,
        }
    }
}

/// Checks and charges quota for each request.
pub struct QuotaEngine {
    store: Arc<dyn UsageStore>,
    config: QuotaConfig,
}

impl QuotaEngine {
    pub fn new(store: Arc<dyn UsageStore>, config: QuotaConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Decide and record usage for one request.
    pub async fn check_and_consume(
        &self,
        api_key_id: &str,
        class: UsageClass,
    ) -> Result<QuotaDecision, QuotaError> {
        self.check_and_consume_at(api_key_id, class, Utc::now()).await
    }

    /// Clock-explicit variant; `check_and_consume` passes the wall clock.
    pub async fn check_and_consume_at(
        &self,
        api_key_id: &str,
        class: UsageClass,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, QuotaError> {
        let week = iso_week_label(now);
        let hour = hour_label(now);

        // Hourly burst gate first; a blown burst cap rejects outright.
        let burst_used = self.store.burst_count(api_key_id, &hour).await?;
        let burst = BurstInfo {
            limit: self.config.burst_limit,
            used: burst_used,
            remaining: self.config.burst_limit.saturating_sub(burst_used),
            resets_in_secs: seconds_to_next_hour(now),
        };

        let weekly = self.weekly_info(api_key_id, &week, now).await?;
        let extra = self.store.extra_usage(api_key_id).await?;

        if burst_used >= self.config.burst_limit {
            info!(api_key_id, %hour, "burst limit hit; hard blocking");
            return Ok(QuotaDecision {
                outcome: QuotaOutcome::HardBlocked {
                    retry_after_secs: burst.resets_in_secs,
                },
                burst,
                weekly,
                extra,
            });
        }

        // Burst tracking is always recorded for requests that proceed.
        // The decision reports the pre-consumption view of both windows.
        self.store.increment_burst(api_key_id, &hour).await?;

        if weekly.remaining > 0 {
            self.store
                .increment_weekly(api_key_id, &week, class)
                .await?;
            return Ok(QuotaDecision {
                outcome: QuotaOutcome::Allowed,
                burst,
                weekly,
                extra,
            });
        }

        if extra.can_charge() {
            let amount = class.rate();
            self.store.charge_extra(api_key_id, class, amount).await?;
            debug!(api_key_id, amount, class = class.as_str(), "charged extra usage");
            return Ok(QuotaDecision {
                outcome: QuotaOutcome::AllowedExtraUsage { charged: amount },
                burst,
                weekly,
                extra,
            });
        }

        // Over quota with nothing to charge: permit but degrade.
        debug!(api_key_id, %week, "weekly quota exhausted; soft limiting");
        Ok(QuotaDecision {
            outcome: QuotaOutcome::SoftLimited,
            burst,
            weekly,
            extra,
        })
    }

    async fn weekly_info(
        &self,
        api_key_id: &str,
        week: &str,
        now: DateTime<Utc>,
    ) -> Result<WeeklyInfo, QuotaError> {
        let usage = self.store.weekly_usage(api_key_id, week).await?;

        let rollover = match usage.rollover_credits {
            Some(credits) => credits,
            None => {
                let prev_week = previous_week_label(now);
                let prev_used = self
                    .store
                    .weekly_usage(api_key_id, &prev_week)
                    .await?
                    .total();
                let credits = self
                    .config
                    .weekly_limit
                    .saturating_sub(prev_used)
                    .min(self.config.weekly_limit);
                self.store
                    .set_rollover_if_unset(api_key_id, week, credits)
                    .await?;
                debug!(api_key_id, week, credits, "computed weekly rollover");
                credits
            }
        };

        let used = usage.total();
        let total_available = self.config.weekly_limit + rollover;
        Ok(WeeklyInfo {
            limit: self.config.weekly_limit,
            used,
            rollover_credits: rollover,
            total_available,
            remaining: total_available.saturating_sub(used),
            percent_used: percent(used, total_available),
            resets_at: next_week_reset(now),
        })
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (used as f64 / total as f64 * 100.0).min(100.0)
}
