//! Job model and lifecycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a terminal job remains queryable before it is purged.
pub const JOB_RETENTION_HOURS: i64 = 24;

/// Kinds of async work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobType {
    Batch,
    Crawl,
    Agent,
    DeepFetch,
}

/// Lifecycle states.
///
/// ```text
/// pending ──┬─► running ──┬─► completed
///           │             ├─► failed
///           └─────────────┴─► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One unit of async work and its progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set when the job reaches a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(job_type: JobType, webhook_url: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_type,
            status: JobStatus::Pending,
            total: None,
            completed: None,
            credits_used: None,
            data: None,
            error: None,
            webhook_url,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Stamp the retention deadline when entering a terminal state.
    pub(crate) fn seal_if_terminal(&mut self) {
        if self.status.is_terminal() && self.expires_at.is_none() {
            self.expires_at = Some(Utc::now() + Duration::hours(JOB_RETENTION_HOURS));
        }
    }
}

/// Last-write-wins partial update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub total: Option<usize>,
    pub completed: Option<usize>,
    pub credits_used: Option<u64>,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_jobs_are_pending_without_expiry() {
        let job = Job::new(JobType::Batch, None);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.expires_at.is_none());
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn job_type_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&JobType::DeepFetch).unwrap(),
            "\"deepFetch\""
        );
        assert_eq!(serde_json::to_string(&JobType::Batch).unwrap(), "\"batch\"");
    }

    #[test]
    fn sealing_sets_a_24h_expiry() {
        let mut job = Job::new(JobType::Crawl, None);
        job.status = JobStatus::Completed;
        job.seal_if_terminal();
        let expires = job.expires_at.unwrap();
        let delta = expires - Utc::now();
        assert!(delta > Duration::hours(23) && delta <= Duration::hours(24));
    }
}
