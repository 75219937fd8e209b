//! In-memory usage store for tests and single-node dev deployments.

use crate::{ExtraUsage, QuotaError, UsageClass, UsageStore, WeeklyUsage};
use async_trait::async_trait;
use dashmap::DashMap;

/// DashMap-backed [`UsageStore`]; counters are atomic per bucket.
#[derive(Default)]
pub struct MemoryUsageStore {
    weekly: DashMap<(String, String), WeeklyUsage>,
    burst: DashMap<(String, String), u64>,
    extra: DashMap<String, ExtraUsage>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed extra-usage state for a key (admin/test path).
    pub fn set_extra_usage(&self, api_key_id: &str, extra: ExtraUsage) {
        self.extra.insert(api_key_id.to_string(), extra);
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn weekly_usage(&self, api_key_id: &str, week: &str) -> Result<WeeklyUsage, QuotaError> {
        Ok(self
            .weekly
            .get(&(api_key_id.to_string(), week.to_string()))
            .map(|u| u.clone())
            .unwrap_or_default())
    }

    async fn set_rollover_if_unset(
        &self,
        api_key_id: &str,
        week: &str,
        credits: u64,
    ) -> Result<(), QuotaError> {
        let mut entry = self
            .weekly
            .entry((api_key_id.to_string(), week.to_string()))
            .or_default();
        if entry.rollover_credits.is_none() {
            entry.rollover_credits = Some(credits);
        }
        Ok(())
    }

    async fn increment_weekly(
        &self,
        api_key_id: &str,
        week: &str,
        class: UsageClass,
    ) -> Result<(), QuotaError> {
        let mut entry = self
            .weekly
            .entry((api_key_id.to_string(), week.to_string()))
            .or_default();
        match class {
            UsageClass::Basic => entry.basic += 1,
            UsageClass::Stealth => entry.stealth += 1,
            UsageClass::Captcha => entry.captcha += 1,
            UsageClass::Search => entry.search += 1,
        }
        Ok(())
    }

    async fn burst_count(&self, api_key_id: &str, hour: &str) -> Result<u64, QuotaError> {
        Ok(self
            .burst
            .get(&(api_key_id.to_string(), hour.to_string()))
            .map(|c| *c)
            .unwrap_or(0))
    }

    async fn increment_burst(&self, api_key_id: &str, hour: &str) -> Result<(), QuotaError> {
        *self
            .burst
            .entry((api_key_id.to_string(), hour.to_string()))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn extra_usage(&self, api_key_id: &str) -> Result<ExtraUsage, QuotaError> {
        Ok(self
            .extra
            .get(api_key_id)
            .map(|e| e.clone())
            .unwrap_or_default())
    }

    async fn charge_extra(
        &self,
        api_key_id: &str,
        _class: UsageClass,
        amount: f64,
    ) -> Result<(), QuotaError> {
        let mut entry = self.extra.entry(api_key_id.to_string()).or_default();
        entry.spent += amount;
        entry.balance = (entry.balance - amount).max(0.0);
        Ok(())
    }
}
