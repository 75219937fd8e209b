//! Async work orchestration for WebPeel: the job queue backing batch and
//! crawl endpoints, webhook delivery, and the persistent URL watcher.

pub mod batch;
pub mod job;
pub mod store;
pub mod watch;
pub mod webhook;

pub use batch::{run_batch, BatchItem};
pub use job::{Job, JobPatch, JobStatus, JobType};
pub use store::JobStore;
pub use watch::{
    MemoryWatchStore, PgWatchStore, Watch, WatchError, WatchFetcher, WatchManager,
    WatchObservation, WatchStatus, WatchStore, MIN_CHECK_INTERVAL_MINUTES,
};
pub use webhook::{WebhookEvent, WebhookNotifier};
