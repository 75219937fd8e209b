//! Persistent URL watches.
//!
//! Watches are stored rows (Postgres in production, in-memory for tests)
//! re-fetched on a schedule. A 60-second ticker selects due watches
//! oldest-first, re-peels each URL, and on a fingerprint change updates
//! the row atomically and notifies the watch's webhook with a
//! paragraph-level diff.

use crate::webhook::{WebhookEvent, WebhookNotifier};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use webpeel_tracking::paragraph_diff;

/// Interval floor; faster schedules are clamped.
pub const MIN_CHECK_INTERVAL_MINUTES: u32 = 5;

/// How many due watches one tick processes.
const TICK_BATCH: usize = 50;

/// Scheduler tick period.
const TICK_PERIOD: std::time::Duration = std::time::Duration::from_secs(60);

/// Error messages stored on a watch row are capped at this length.
const MAX_ERROR_LEN: usize = 500;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("watch store error: {0}")]
    Store(String),
    #[error("watch not found: {0}")]
    NotFound(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
}

impl From<sqlx::Error> for WatchError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchStatus {
    Active,
    Paused,
    Error,
}

impl WatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "paused" => Self::Paused,
            "error" => Self::Error,
            _ => Self::Active,
        }
    }
}

/// A persistent watch row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watch {
    pub id: String,
    pub account_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub check_interval_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_changed_at: Option<DateTime<Utc>>,
    pub change_count: u64,
    pub status: WatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Watch {
    /// New active watch with the interval floor applied.
    pub fn new(
        account_id: impl Into<String>,
        url: impl Into<String>,
        webhook_url: Option<String>,
        check_interval_minutes: u32,
        selector: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            url: url.into(),
            webhook_url,
            check_interval_minutes: check_interval_minutes.max(MIN_CHECK_INTERVAL_MINUTES),
            selector,
            last_fingerprint: None,
            last_checked_at: None,
            last_changed_at: None,
            change_count: 0,
            status: WatchStatus::Active,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.status != WatchStatus::Active {
            return false;
        }
        match self.last_checked_at {
            None => true,
            Some(checked) => {
                checked + Duration::minutes(i64::from(self.check_interval_minutes)) <= now
            }
        }
    }
}

/// Persistence for watch rows.
#[async_trait]
pub trait WatchStore: Send + Sync {
    async fn create(&self, watch: &Watch) -> Result<(), WatchError>;
    async fn get(&self, id: &str) -> Result<Option<Watch>, WatchError>;
    async fn list(&self, account_id: &str) -> Result<Vec<Watch>, WatchError>;
    async fn delete(&self, id: &str, account_id: &str) -> Result<bool, WatchError>;

    /// Active watches due for a check, oldest `last_checked_at` first.
    async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Watch>, WatchError>;

    /// Atomic change update: fingerprint, timestamps, counter, status and
    /// error reset in one write.
    async fn mark_changed(
        &self,
        id: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError>;

    /// No-change update: bump `last_checked_at`, set the fingerprint when
    /// absent, clear any error state.
    async fn mark_checked(
        &self,
        id: &str,
        fingerprint: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError>;

    async fn mark_error(
        &self,
        id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError>;
}

/// What one watch check observed.
#[derive(Debug, Clone)]
pub struct WatchObservation {
    pub content: String,
    /// Full 64-char content fingerprint.
    pub fingerprint: String,
    /// Content of the prior snapshot, when one existed.
    pub previous_content: Option<String>,
}

/// Page-fetch capability the manager drives; implemented by the
/// orchestrator so watch checks go through the full peel pipeline.
#[async_trait]
pub trait WatchFetcher: Send + Sync {
    async fn observe(
        &self,
        url: &str,
        selector: Option<&str>,
    ) -> Result<WatchObservation, WatchError>;
}

/// The scheduler and check executor.
pub struct WatchManager {
    store: Arc<dyn WatchStore>,
    fetcher: Arc<dyn WatchFetcher>,
    notifier: Arc<WebhookNotifier>,
}

impl WatchManager {
    pub fn new(
        store: Arc<dyn WatchStore>,
        fetcher: Arc<dyn WatchFetcher>,
        notifier: Arc<WebhookNotifier>,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
        }
    }

    pub fn store(&self) -> Arc<dyn WatchStore> {
        Arc::clone(&self.store)
    }

    /// Spawn the ticker. The returned handle aborts the loop on drop via
    /// the caller (used for graceful shutdown).
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_PERIOD);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!("watch scheduler started");
            loop {
                ticker.tick().await;
                self.run_due_checks().await;
            }
        })
    }

    /// One scheduler pass: check every due watch, logging failures and
    /// continuing with the rest.
    pub async fn run_due_checks(&self) {
        let due = match self.store.due(Utc::now(), TICK_BATCH).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "failed to select due watches");
                return;
            }
        };
        if due.is_empty() {
            return;
        }
        debug!(count = due.len(), "processing due watches");
        for watch in due {
            if let Err(e) = self.check(&watch.id).await {
                error!(watch_id = %watch.id, url = %watch.url, error = %e, "watch check failed");
            }
        }
    }

    /// Check one watch now.
    pub async fn check(&self, id: &str) -> Result<(), WatchError> {
        let watch = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| WatchError::NotFound(id.to_string()))?;
        let now = Utc::now();

        let observation = match self
            .fetcher
            .observe(&watch.url, watch.selector.as_deref())
            .await
        {
            Ok(observation) => observation,
            Err(e) => {
                let message: String = e.to_string().chars().take(MAX_ERROR_LEN).collect();
                self.store.mark_error(id, &message, now).await?;
                return Err(e);
            }
        };

        let prior = watch.last_fingerprint.as_deref().unwrap_or("");
        let changed = !prior.is_empty() && prior != observation.fingerprint;

        if changed {
            self.store
                .mark_changed(id, &observation.fingerprint, now)
                .await?;
            let (added, removed) = paragraph_diff(
                observation.previous_content.as_deref().unwrap_or(""),
                &observation.content,
            );
            info!(watch_id = %id, url = %watch.url, added = added.len(), removed = removed.len(), "watch detected change");
            if watch.webhook_url.is_some() {
                let event = WebhookEvent::watch_changed(serde_json::json!({
                    "watchId": watch.id,
                    "url": watch.url,
                    "changeCount": watch.change_count + 1,
                    "checkedAt": now.to_rfc3339(),
                    "diff": { "added": added, "removed": removed },
                }));
                self.notifier
                    .deliver_if_configured(watch.webhook_url.as_deref(), &event)
                    .await;
            }
        } else {
            let fingerprint_if_absent =
                prior.is_empty().then_some(observation.fingerprint.as_str());
            self.store
                .mark_checked(id, fingerprint_if_absent, now)
                .await?;
        }
        Ok(())
    }
}

/// DashMap-backed store for tests and keyless dev runs.
#[derive(Default)]
pub struct MemoryWatchStore {
    watches: DashMap<String, Watch>,
}

impl MemoryWatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatchStore for MemoryWatchStore {
    async fn create(&self, watch: &Watch) -> Result<(), WatchError> {
        self.watches.insert(watch.id.clone(), watch.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Watch>, WatchError> {
        Ok(self.watches.get(id).map(|w| w.clone()))
    }

    async fn list(&self, account_id: &str) -> Result<Vec<Watch>, WatchError> {
        let mut out: Vec<Watch> = self
            .watches
            .iter()
            .filter(|w| w.account_id == account_id)
            .map(|w| w.clone())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn delete(&self, id: &str, account_id: &str) -> Result<bool, WatchError> {
        let owned = self
            .watches
            .get(id)
            .map(|w| w.account_id == account_id)
            .unwrap_or(false);
        if owned {
            self.watches.remove(id);
        }
        Ok(owned)
    }

    async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Watch>, WatchError> {
        let mut due: Vec<Watch> = self
            .watches
            .iter()
            .filter(|w| w.is_due(now))
            .map(|w| w.clone())
            .collect();
        due.sort_by_key(|w| w.last_checked_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_changed(
        &self,
        id: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError> {
        if let Some(mut watch) = self.watches.get_mut(id) {
            watch.last_fingerprint = Some(fingerprint.to_string());
            watch.last_checked_at = Some(now);
            watch.last_changed_at = Some(now);
            watch.change_count += 1;
            watch.status = WatchStatus::Active;
            watch.error_message = None;
            watch.updated_at = now;
        }
        Ok(())
    }

    async fn mark_checked(
        &self,
        id: &str,
        fingerprint: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError> {
        if let Some(mut watch) = self.watches.get_mut(id) {
            if let Some(fingerprint) = fingerprint {
                watch.last_fingerprint = Some(fingerprint.to_string());
            }
            watch.last_checked_at = Some(now);
            watch.status = WatchStatus::Active;
            watch.error_message = None;
            watch.updated_at = now;
        }
        Ok(())
    }

    async fn mark_error(
        &self,
        id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError> {
        if let Some(mut watch) = self.watches.get_mut(id) {
            watch.status = WatchStatus::Error;
            watch.error_message = Some(message.to_string());
            watch.last_checked_at = Some(now);
            watch.updated_at = now;
        }
        Ok(())
    }
}

/// Postgres-backed store used in production.
pub struct PgWatchStore {
    pool: PgPool,
}

impl PgWatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_watch(row: &sqlx::postgres::PgRow) -> Watch {
        Watch {
            id: row.get("id"),
            account_id: row.get("account_id"),
            url: row.get("url"),
            webhook_url: row.get("webhook_url"),
            check_interval_minutes: row.get::<i32, _>("check_interval_minutes") as u32,
            selector: row.get("selector"),
            last_fingerprint: row.get("last_fingerprint"),
            last_checked_at: row.get("last_checked_at"),
            last_changed_at: row.get("last_changed_at"),
            change_count: row.get::<i64, _>("change_count") as u64,
            status: WatchStatus::from_str(row.get::<String, _>("status").as_str()),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const WATCH_COLUMNS: &str = "id, account_id, url, webhook_url, check_interval_minutes, selector, \
     last_fingerprint, last_checked_at, last_changed_at, change_count, status, error_message, \
     created_at, updated_at";

#[async_trait]
impl WatchStore for PgWatchStore {
    async fn create(&self, watch: &Watch) -> Result<(), WatchError> {
        sqlx::query(
            "INSERT INTO watches (id, account_id, url, webhook_url, check_interval_minutes, \
             selector, change_count, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, $8)",
        )
        .bind(&watch.id)
        .bind(&watch.account_id)
        .bind(&watch.url)
        .bind(&watch.webhook_url)
        .bind(watch.check_interval_minutes as i32)
        .bind(&watch.selector)
        .bind(watch.status.as_str())
        .bind(watch.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Watch>, WatchError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM watches WHERE id = $1",
            WATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(Self::row_to_watch))
    }

    async fn list(&self, account_id: &str) -> Result<Vec<Watch>, WatchError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM watches WHERE account_id = $1 ORDER BY created_at",
            WATCH_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_watch).collect())
    }

    async fn delete(&self, id: &str, account_id: &str) -> Result<bool, WatchError> {
        let result = sqlx::query("DELETE FROM watches WHERE id = $1 AND account_id = $2")
            .bind(id)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Watch>, WatchError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM watches \
             WHERE status = 'active' AND (last_checked_at IS NULL \
                OR last_checked_at < $1 - (check_interval_minutes * interval '1 minute')) \
             ORDER BY last_checked_at ASC NULLS FIRST LIMIT $2",
            WATCH_COLUMNS
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_watch).collect())
    }

    async fn mark_changed(
        &self,
        id: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError> {
        sqlx::query(
            "UPDATE watches SET last_fingerprint = $2, last_checked_at = $3, \
             last_changed_at = $3, change_count = change_count + 1, status = 'active', \
             error_message = NULL, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(fingerprint)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_checked(
        &self,
        id: &str,
        fingerprint: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError> {
        sqlx::query(
            "UPDATE watches SET last_fingerprint = COALESCE($2, last_fingerprint), \
             last_checked_at = $3, status = 'active', error_message = NULL, updated_at = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(fingerprint)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_error(
        &self,
        id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError> {
        sqlx::query(
            "UPDATE watches SET status = 'error', error_message = $2, last_checked_at = $3, \
             updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap as TestMap;

    struct ScriptedFetcher {
        observations: TestMap<String, WatchObservation>,
        fail: bool,
    }

    impl ScriptedFetcher {
        fn observing(url: &str, content: &str, fingerprint: &str) -> Arc<Self> {
            let observations = TestMap::new();
            observations.insert(
                url.to_string(),
                WatchObservation {
                    content: content.to_string(),
                    fingerprint: fingerprint.to_string(),
                    previous_content: None,
                },
            );
            Arc::new(Self {
                observations,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                observations: TestMap::new(),
                fail: true,
            })
        }

        fn set(&self, url: &str, observation: WatchObservation) {
            self.observations.insert(url.to_string(), observation);
        }
    }

    #[async_trait]
    impl WatchFetcher for ScriptedFetcher {
        async fn observe(
            &self,
            url: &str,
            _selector: Option<&str>,
        ) -> Result<WatchObservation, WatchError> {
            if self.fail {
                return Err(WatchError::Fetch("connection refused".into()));
            }
            self.observations
                .get(url)
                .map(|o| o.clone())
                .ok_or_else(|| WatchError::Fetch("no script for url".into()))
        }
    }

    fn manager(
        store: Arc<MemoryWatchStore>,
        fetcher: Arc<dyn WatchFetcher>,
    ) -> WatchManager {
        WatchManager::new(store, fetcher, Arc::new(WebhookNotifier::new()))
    }

    const URL: &str = "https://watched.example.com/page";

    #[tokio::test]
    async fn interval_floor_is_enforced() {
        let watch = Watch::new("acct", URL, None, 1, None);
        assert_eq!(watch.check_interval_minutes, MIN_CHECK_INTERVAL_MINUTES);
    }

    #[tokio::test]
    async fn first_check_records_fingerprint_without_counting_a_change() {
        let store = Arc::new(MemoryWatchStore::new());
        let watch = Watch::new("acct", URL, None, 30, None);
        store.create(&watch).await.unwrap();

        let fetcher = ScriptedFetcher::observing(URL, "content", "aaaa");
        manager(store.clone(), fetcher).check(&watch.id).await.unwrap();

        let after = store.get(&watch.id).await.unwrap().unwrap();
        assert_eq!(after.last_fingerprint.as_deref(), Some("aaaa"));
        assert_eq!(after.change_count, 0);
        assert!(after.last_checked_at.is_some());
        assert!(after.last_changed_at.is_none());
    }

    #[tokio::test]
    async fn changed_fingerprint_bumps_count_and_changed_at() {
        let store = Arc::new(MemoryWatchStore::new());
        let watch = Watch::new("acct", URL, None, 30, None);
        store.create(&watch).await.unwrap();

        let fetcher = ScriptedFetcher::observing(URL, "v1 content here", "aaaa");
        let mgr = manager(store.clone(), fetcher.clone());
        mgr.check(&watch.id).await.unwrap();

        fetcher.set(
            URL,
            WatchObservation {
                content: "v2 content entirely".into(),
                fingerprint: "bbbb".into(),
                previous_content: Some("v1 content here".into()),
            },
        );
        mgr.check(&watch.id).await.unwrap();

        let after = store.get(&watch.id).await.unwrap().unwrap();
        assert_eq!(after.change_count, 1);
        assert_eq!(after.last_fingerprint.as_deref(), Some("bbbb"));
        assert!(after.last_changed_at.is_some());

        // Unchanged content leaves the counter alone.
        mgr.check(&watch.id).await.unwrap();
        let later = store.get(&watch.id).await.unwrap().unwrap();
        assert_eq!(later.change_count, 1);
        assert_eq!(later.last_changed_at, after.last_changed_at);
    }

    #[tokio::test]
    async fn fetch_failures_set_error_state_and_propagate() {
        let store = Arc::new(MemoryWatchStore::new());
        let watch = Watch::new("acct", URL, None, 30, None);
        store.create(&watch).await.unwrap();

        let result = manager(store.clone(), ScriptedFetcher::failing())
            .check(&watch.id)
            .await;
        assert!(result.is_err());

        let after = store.get(&watch.id).await.unwrap().unwrap();
        assert_eq!(after.status, WatchStatus::Error);
        assert!(after.error_message.as_deref().unwrap().contains("refused"));
        assert!(after.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn paused_and_errored_watches_are_not_scheduled() {
        let store = Arc::new(MemoryWatchStore::new());
        let mut active = Watch::new("acct", URL, None, 30, None);
        active.status = WatchStatus::Active;
        let mut paused = Watch::new("acct", "https://other.com", None, 30, None);
        paused.status = WatchStatus::Paused;
        store.create(&active).await.unwrap();
        store.create(&paused).await.unwrap();

        let due = store.due(Utc::now(), 50).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, active.id);
    }

    #[tokio::test]
    async fn recently_checked_watches_wait_for_their_interval() {
        let store = Arc::new(MemoryWatchStore::new());
        let watch = Watch::new("acct", URL, None, 30, None);
        store.create(&watch).await.unwrap();
        store
            .mark_checked(&watch.id, Some("aaaa"), Utc::now())
            .await
            .unwrap();

        assert!(store.due(Utc::now(), 50).await.unwrap().is_empty());
        let later = Utc::now() + Duration::minutes(31);
        assert_eq!(store.due(later, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scheduler_pass_checks_due_watches() {
        let store = Arc::new(MemoryWatchStore::new());
        let watch = Watch::new("acct", URL, None, 30, None);
        store.create(&watch).await.unwrap();
        let fetcher = ScriptedFetcher::observing(URL, "content", "aaaa");

        manager(store.clone(), fetcher).run_due_checks().await;
        let after = store.get(&watch.id).await.unwrap().unwrap();
        assert!(after.last_checked_at.is_some());
    }
}
