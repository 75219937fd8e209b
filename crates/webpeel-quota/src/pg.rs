//! Postgres-backed usage store.
//!
//! Counter increments are `INSERT … ON CONFLICT … UPDATE` so concurrent
//! requests never lose updates; `total_count` is a generated column on
//! the weekly table.

use crate::{ExtraUsage, QuotaError, UsageClass, UsageStore, WeeklyUsage};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

/// Production [`UsageStore`] over a pooled Postgres connection.
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn weekly_column(class: UsageClass) -> &'static str {
        match class {
            UsageClass::Basic => "basic_count",
            UsageClass::Stealth => "stealth_count",
            UsageClass::Captcha => "captcha_count",
            UsageClass::Search => "search_count",
        }
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn weekly_usage(&self, api_key_id: &str, week: &str) -> Result<WeeklyUsage, QuotaError> {
        let row = sqlx::query(
            "SELECT basic_count, stealth_count, captcha_count, search_count, rollover_credits \
             FROM weekly_usage WHERE api_key_id = $1 AND week = $2",
        )
        .bind(api_key_id)
        .bind(week)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => WeeklyUsage {
                basic: row.get::<i64, _>("basic_count") as u64,
                stealth: row.get::<i64, _>("stealth_count") as u64,
                captcha: row.get::<i64, _>("captcha_count") as u64,
                search: row.get::<i64, _>("search_count") as u64,
                rollover_credits: row
                    .get::<Option<i64>, _>("rollover_credits")
                    .map(|c| c as u64),
            },
            None => WeeklyUsage::default(),
        })
    }

    async fn set_rollover_if_unset(
        &self,
        api_key_id: &str,
        week: &str,
        credits: u64,
    ) -> Result<(), QuotaError> {
        sqlx::query(
            "INSERT INTO weekly_usage (api_key_id, week, rollover_credits) VALUES ($1, $2, $3) \
             ON CONFLICT (api_key_id, week) DO UPDATE \
             SET rollover_credits = EXCLUDED.rollover_credits \
             WHERE weekly_usage.rollover_credits IS NULL",
        )
        .bind(api_key_id)
        .bind(week)
        .bind(credits as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_weekly(
        &self,
        api_key_id: &str,
        week: &str,
        class: UsageClass,
    ) -> Result<(), QuotaError> {
        let column = Self::weekly_column(class);
        // Column names come from the fixed enum above, never user input.
        let sql = format!(
            "INSERT INTO weekly_usage (api_key_id, week, {col}) VALUES ($1, $2, 1) \
             ON CONFLICT (api_key_id, week) DO UPDATE \
             SET {col} = weekly_usage.{col} + 1",
            col = column
        );
        sqlx::query(&sql)
            .bind(api_key_id)
            .bind(week)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn burst_count(&self, api_key_id: &str, hour: &str) -> Result<u64, QuotaError> {
        let row = sqlx::query(
            "SELECT count FROM burst_usage WHERE api_key_id = $1 AND hour_bucket = $2",
        )
        .bind(api_key_id)
        .bind(hour)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get::<i64, _>("count") as u64).unwrap_or(0))
    }

    async fn increment_burst(&self, api_key_id: &str, hour: &str) -> Result<(), QuotaError> {
        sqlx::query(
            "INSERT INTO burst_usage (api_key_id, hour_bucket, count) VALUES ($1, $2, 1) \
             ON CONFLICT (api_key_id, hour_bucket) DO UPDATE \
             SET count = burst_usage.count + 1",
        )
        .bind(api_key_id)
        .bind(hour)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn extra_usage(&self, api_key_id: &str) -> Result<ExtraUsage, QuotaError> {
        let row = sqlx::query(
            "SELECT u.extra_usage_enabled, u.extra_balance, u.extra_spent, \
                    u.spending_limit, u.auto_reload \
             FROM users u JOIN api_keys k ON k.user_id = u.id \
             WHERE k.id = $1",
        )
        .bind(api_key_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => ExtraUsage {
                enabled: row.get("extra_usage_enabled"),
                balance: row.get("extra_balance"),
                spent: row.get("extra_spent"),
                spending_limit: row.get("spending_limit"),
                auto_reload: row.get("auto_reload"),
            },
            None => ExtraUsage::default(),
        })
    }

    async fn charge_extra(
        &self,
        api_key_id: &str,
        class: UsageClass,
        amount: f64,
    ) -> Result<(), QuotaError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE users SET extra_spent = extra_spent + $2, \
                    extra_balance = GREATEST(extra_balance - $2, 0) \
             FROM api_keys k WHERE k.user_id = users.id AND k.id = $1",
        )
        .bind(api_key_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO extra_usage_logs (api_key_id, class, amount, charged_at) \
             VALUES ($1, $2, $3, NOW())",
        )
        .bind(api_key_id)
        .bind(class.as_str())
        .bind(amount)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
