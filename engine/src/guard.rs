use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Single-flight lock for one job kind. Clones share the same lock.
#[derive(Clone, Debug)]
pub struct JobLock {
    name: &'static str,
    inner: Arc<Mutex<()>>,
}

impl JobLock {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `None` while another invocation holds the lock.
    pub fn try_acquire(&self) -> Option<JobGuard> {
        let guard = self.inner.clone().try_lock_owned().ok()?;
        debug!(job = self.name, "job lock acquired");
        Some(JobGuard {
            name: self.name,
            _guard: guard,
        })
    }

    pub fn is_running(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

/// Held for the duration of a job; released on drop, error paths included.
#[derive(Debug)]
pub struct JobGuard {
    name: &'static str,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        debug!(job = self.name, "job lock released");
    }
}
