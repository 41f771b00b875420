//! Per-job async locks whose table entries live only while in use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock table with one async mutex per job id, created on first use.
///
/// Holders of the same job's guard are serialized; different jobs never
/// contend beyond the brief table lookup. An entry is removed when the last
/// guard or waiter for its job goes away.
#[derive(Debug, Default)]
pub struct JobLocks {
    name: &'static str,
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Holds a job's lock until dropped.
#[derive(Debug)]
pub struct JobLockGuard<'a> {
    locks: &'a JobLocks,
    job_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl JobLocks {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            table: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lock(&self, job_id: &str) -> JobLockGuard<'_> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table
                .entry(job_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        tracing::trace!(lock = self.name, job_id, "Waiting for job lock");
        JobLockGuard {
            locks: self,
            job_id: job_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of jobs that have a lock entry.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the job's entry when the table holds the only reference to it.
    fn release(&self, job_id: &str) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if table.get(job_id).map_or(false, |lock| Arc::strong_count(lock) == 1) {
            table.remove(job_id);
            tracing::trace!(lock = self.name, job_id, "Removed idle job lock");
        }
    }
}

impl Drop for JobLockGuard<'_> {
    fn drop(&mut self) {
        // the owned guard keeps its own reference, so release it first
        drop(self.guard.take());
        self.locks.release(&self.job_id);
    }
}
