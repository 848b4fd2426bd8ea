pub mod aggregate;
pub mod guard;
pub mod retry;
pub mod scheduler;
pub mod snapshot;
pub mod sync;

pub use aggregate::aggregate_page;
pub use guard::{JobGuard, JobLock};
pub use retry::{is_transient, RetryPolicy};
pub use scheduler::{run_scheduler, JobOutcome, LeaderboardJobs, SchedulerConfig};
pub use snapshot::{run_snapshot, SnapshotConfig};
pub use sync::{run_sync, SyncConfig};
