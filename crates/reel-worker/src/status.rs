//! Concurrency-safe job status store.
//!
//! Each submitted job gets exactly one [`StatusHandle`]. The handle is the
//! only writer of the job's terminal status and consumes itself when it
//! publishes, so a job cannot be completed twice or move from `failed`
//! back to `complete`. A handle dropped without publishing (a panicked
//! task, an aborted runtime) records the job as failed.

use reel_models::{JobId, JobStatus};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::error::{WorkerError, WorkerResult};

/// Shared map of job ID to status.
#[derive(Debug, Clone, Default)]
pub struct JobStatusStore {
    inner: Arc<RwLock<HashMap<JobId, JobStatus>>>,
}

impl JobStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a job as processing and hand out its single writer.
    pub fn register(&self, job_id: JobId) -> WorkerResult<StatusHandle> {
        let mut map = self.write();
        if map.contains_key(&job_id) {
            return Err(WorkerError::DuplicateJob(job_id));
        }
        map.insert(job_id.clone(), JobStatus::processing());
        Ok(StatusHandle {
            job_id,
            store: self.clone(),
            published: false,
        })
    }

    pub fn get(&self, job_id: &JobId) -> Option<JobStatus> {
        self.read().get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Jobs that have not reached a terminal state.
    pub fn in_flight(&self) -> usize {
        self.read().values().filter(|s| !s.is_terminal()).count()
    }

    /// Copy of every job and its status.
    pub fn snapshot(&self) -> Vec<(JobId, JobStatus)> {
        self.read()
            .iter()
            .map(|(id, status)| (id.clone(), status.clone()))
            .collect()
    }

    fn set_terminal(&self, job_id: &JobId, status: JobStatus) {
        let mut map = self.write();
        match map.get(job_id) {
            Some(current) if current.is_terminal() => {
                warn!(job_id = %job_id, "Ignoring status update for finished job");
            }
            _ => {
                map.insert(job_id.clone(), status);
            }
        }
    }

    // A writer that panicked mid-update leaves the map consistent: every
    // mutation is a single insert.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, JobStatus>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, JobStatus>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Single writer of one job's terminal status.
#[derive(Debug)]
pub struct StatusHandle {
    job_id: JobId,
    store: JobStatusStore,
    published: bool,
}

impl StatusHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn complete(mut self, output_path: impl Into<PathBuf>) {
        self.published = true;
        self.store
            .set_terminal(&self.job_id, JobStatus::complete(output_path));
    }

    pub fn fail(mut self, error_message: impl Into<String>) {
        self.published = true;
        self.store
            .set_terminal(&self.job_id, JobStatus::failed(error_message));
    }
}

impl Drop for StatusHandle {
    fn drop(&mut self) {
        if !self.published {
            self.store.set_terminal(
                &self.job_id,
                JobStatus::failed("job ended without reporting a result"),
            );
        }
    }
}
