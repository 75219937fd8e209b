//! In-process job store.
//!
//! Jobs live in a process-wide map; durability across restarts is
//! explicitly out of scope. Patches are last-write-wins and terminal
//! jobs are purged 24 hours after finishing.

use crate::job::{Job, JobPatch, JobStatus, JobType};
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

/// Process-wide job registry.
#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<String, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_job(&self, job_type: JobType, webhook_url: Option<String>) -> Job {
        let job = Job::new(job_type, webhook_url);
        self.jobs.insert(job.id.clone(), job.clone());
        debug!(job_id = %job.id, job_type = ?job.job_type, "job created");
        job
    }

    pub fn get_job(&self, id: &str) -> Option<Job> {
        self.jobs.get(id).map(|j| j.clone())
    }

    /// Apply a patch. Returns the updated job, or `None` for unknown ids.
    /// Terminal states are final: a patch cannot move a job out of one.
    pub fn update_job(&self, id: &str, patch: JobPatch) -> Option<Job> {
        let mut entry = self.jobs.get_mut(id)?;
        if let Some(status) = patch.status {
            if !entry.status.is_terminal() {
                entry.status = status;
            }
        }
        if patch.total.is_some() {
            entry.total = patch.total;
        }
        if patch.completed.is_some() {
            entry.completed = patch.completed;
        }
        if patch.credits_used.is_some() {
            entry.credits_used = patch.credits_used;
        }
        if patch.data.is_some() {
            entry.data = patch.data;
        }
        if patch.error.is_some() {
            entry.error = patch.error;
        }
        entry.seal_if_terminal();
        Some(entry.clone())
    }

    /// Cancel a job. Only pending or running jobs can be cancelled.
    pub fn cancel_job(&self, id: &str) -> bool {
        match self.jobs.get_mut(id) {
            Some(mut entry) if !entry.status.is_terminal() => {
                entry.status = JobStatus::Cancelled;
                entry.seal_if_terminal();
                debug!(job_id = %id, "job cancelled");
                true
            }
            _ => false,
        }
    }

    pub fn is_cancelled(&self, id: &str) -> bool {
        self.jobs
            .get(id)
            .map(|j| j.status == JobStatus::Cancelled)
            .unwrap_or(true)
    }

    /// List jobs, optionally filtered by status, newest first.
    pub fn list_jobs(&self, status: Option<JobStatus>) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .map(|j| j.clone())
            .filter(|j| status.map(|s| j.status == s).unwrap_or(true))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Drop terminal jobs past their retention deadline. Returns how many
    /// were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .jobs
            .iter()
            .filter(|j| j.expires_at.map(|e| e <= now).unwrap_or(false))
            .map(|j| j.id.clone())
            .collect();
        for id in &expired {
            self.jobs.remove(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "purged expired jobs");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_roundtrip() {
        let store = JobStore::new();
        let job = store.create_job(JobType::Batch, Some("https://hook".into()));
        let loaded = store.get_job(&job.id).unwrap();
        assert_eq!(loaded.status, JobStatus::Pending);
        assert_eq!(loaded.webhook_url.as_deref(), Some("https://hook"));
    }

    #[test]
    fn patches_are_last_write_wins() {
        let store = JobStore::new();
        let job = store.create_job(JobType::Batch, None);
        store.update_job(
            &job.id,
            JobPatch {
                status: Some(JobStatus::Running),
                total: Some(10),
                ..Default::default()
            },
        );
        let updated = store
            .update_job(
                &job.id,
                JobPatch {
                    completed: Some(4),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, JobStatus::Running);
        assert_eq!(updated.total, Some(10));
        assert_eq!(updated.completed, Some(4));
    }

    #[test]
    fn cancellation_only_from_live_states() {
        let store = JobStore::new();
        let job = store.create_job(JobType::Crawl, None);
        assert!(store.cancel_job(&job.id));
        // Already cancelled: a second cancel is refused.
        assert!(!store.cancel_job(&job.id));

        let done = store.create_job(JobType::Batch, None);
        store.update_job(
            &done.id,
            JobPatch {
                status: Some(JobStatus::Completed),
                ..Default::default()
            },
        );
        assert!(!store.cancel_job(&done.id));
    }

    #[test]
    fn terminal_jobs_gain_expiry_and_purge() {
        let store = JobStore::new();
        let job = store.create_job(JobType::Batch, None);
        let updated = store
            .update_job(
                &job.id,
                JobPatch {
                    status: Some(JobStatus::Failed),
                    error: Some("boom".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.expires_at.is_some());

        // Not yet expired.
        assert_eq!(store.purge_expired(), 0);

        // Force the deadline into the past.
        store
            .jobs
            .get_mut(&job.id)
            .unwrap()
            .expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.get_job(&job.id).is_none());
    }

    #[test]
    fn list_filters_by_status() {
        let store = JobStore::new();
        let a = store.create_job(JobType::Batch, None);
        store.create_job(JobType::Batch, None);
        store.update_job(
            &a.id,
            JobPatch {
                status: Some(JobStatus::Running),
                ..Default::default()
            },
        );
        assert_eq!(store.list_jobs(Some(JobStatus::Running)).len(), 1);
        assert_eq!(store.list_jobs(None).len(), 2);
    }

    #[test]
    fn terminal_states_are_final() {
        let store = JobStore::new();
        let job = store.create_job(JobType::Batch, None);
        store.cancel_job(&job.id);
        let after = store
            .update_job(
                &job.id,
                JobPatch {
                    status: Some(JobStatus::Running),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(after.status, JobStatus::Cancelled);
    }

    #[test]
    fn unknown_jobs_read_as_cancelled() {
        let store = JobStore::new();
        assert!(store.is_cancelled("missing"));
    }
}
