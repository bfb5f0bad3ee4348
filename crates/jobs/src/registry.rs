//! In-memory registry of generation jobs.
//!
//! All reads and writes go through one `tokio::sync::Mutex`; critical
//! sections only touch fields and never perform I/O. Ownership of a job's
//! files moves to whoever removes the entry (download or janitor), so they
//! are deleted exactly once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use certgen_core::cleanup;
use certgen_core::error::{CoreError, CoreResult};
use certgen_core::types::{JobId, Timestamp};
use chrono::{Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// Default time a finished job is kept for download.
pub const DEFAULT_FINISHED_TTL_SECS: i64 = 600;

/// Default time after which a silent `running` job is considered abandoned.
pub const DEFAULT_STALE_TTL_SECS: i64 = 3600;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    Failed(String),
}

/// Point-in-time copy of a job's progress, as returned to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub completed: u64,
    pub total: u64,
    pub error: Option<String>,
}

/// Files owned by a job, handed to the caller when the job is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResources {
    pub output_dir: PathBuf,
    pub uploads: Vec<PathBuf>,
}

impl JobResources {
    /// Best-effort delete of the uploaded source files.
    pub fn release_uploads(&self) {
        for upload in &self.uploads {
            let _ = cleanup::remove_file(upload);
        }
    }

    /// Best-effort delete of the output directory and uploads.
    pub fn release(&self) {
        let _ = cleanup::remove_dir(&self.output_dir);
        self.release_uploads();
    }
}

/// Expiry thresholds used by the janitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTtl {
    /// How long a `done` / `error` job is kept after its last update.
    pub finished: Duration,
    /// How long a `running` job may go without an update.
    pub stale: Duration,
}

impl JobTtl {
    pub fn from_secs(finished_secs: i64, stale_secs: i64) -> Self {
        Self {
            finished: Duration::seconds(finished_secs),
            stale: Duration::seconds(stale_secs),
        }
    }
}

impl Default for JobTtl {
    fn default() -> Self {
        Self::from_secs(DEFAULT_FINISHED_TTL_SECS, DEFAULT_STALE_TTL_SECS)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct JobEntry {
    status: JobStatus,
    completed: u64,
    total: u64,
    error: Option<String>,
    output_dir: PathBuf,
    uploads: Vec<PathBuf>,
    font_selector: Option<String>,
    #[allow(dead_code)]
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl JobEntry {
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            status: self.status,
            completed: self.completed,
            total: self.total,
            error: self.error.clone(),
        }
    }

    fn into_resources(self) -> JobResources {
        JobResources {
            output_dir: self.output_dir,
            uploads: self.uploads,
        }
    }

    fn is_expired(&self, now: Timestamp, ttl: &JobTtl) -> bool {
        let idle = now - self.updated_at;
        if self.status.is_terminal() {
            idle > ttl.finished
        } else {
            idle > ttl.stale
        }
    }
}

/// Shared table of generation jobs.
///
/// Designed to be wrapped in `Arc` and handed to request handlers, job
/// runners and the janitor.
#[derive(Debug)]
pub struct JobRegistry {
    output_root: PathBuf,
    jobs: Mutex<HashMap<JobId, JobEntry>>,
}

fn not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: id.to_string(),
    }
}

impl JobRegistry {
    /// Create an empty registry. Each job writes into
    /// `{output_root}/{job_id}`.
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Register a new `running` job and return its id.
    ///
    /// The entry is visible as soon as this returns, so a task spawned
    /// afterwards can always find it.
    pub async fn create(
        &self,
        total_hint: u64,
        uploads: Vec<PathBuf>,
        font_selector: Option<String>,
    ) -> JobId {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let entry = JobEntry {
            status: JobStatus::Running,
            completed: 0,
            total: total_hint,
            error: None,
            output_dir: self.output_root.join(&id),
            uploads,
            font_selector,
            created_at: now,
            updated_at: now,
        };

        self.jobs.lock().await.insert(id.clone(), entry);
        tracing::debug!(job_id = %id, total = total_hint, "Job registered");
        id
    }

    /// Record the real row count once the data has been loaded.
    ///
    /// Rows already counted are kept, clamped to `total`.
    pub async fn set_total(&self, id: &str, total: u64) {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get_mut(id) {
            if job.status.is_terminal() {
                return;
            }
            job.total = total;
            job.completed = job.completed.min(total);
            job.touch();
        }
    }

    /// Count one more finished row. Ignored for unknown jobs.
    pub async fn advance(&self, id: &str) {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get_mut(id) {
            if job.status.is_terminal() {
                return;
            }
            if job.completed < job.total {
                job.completed += 1;
            }
            job.touch();
        }
    }

    /// Move a running job to its terminal state. Ignored for unknown or
    /// already finished jobs.
    pub async fn finish(&self, id: &str, outcome: JobOutcome) {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(id) else {
            return;
        };
        if job.status.is_terminal() {
            return;
        }
        match outcome {
            JobOutcome::Done => job.status = JobStatus::Done,
            JobOutcome::Failed(detail) => {
                job.status = JobStatus::Error;
                job.error = Some(detail);
            }
        }
        job.touch();
    }

    /// Current progress of a job.
    pub async fn read(&self, id: &str) -> CoreResult<JobSnapshot> {
        self.jobs
            .lock()
            .await
            .get(id)
            .map(JobEntry::snapshot)
            .ok_or_else(|| not_found(id))
    }

    /// Output directory of a live job.
    pub async fn output_dir(&self, id: &str) -> CoreResult<PathBuf> {
        self.jobs
            .lock()
            .await
            .get(id)
            .map(|job| job.output_dir.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Font chosen for a live job.
    pub async fn font_selector(&self, id: &str) -> CoreResult<Option<String>> {
        self.jobs
            .lock()
            .await
            .get(id)
            .map(|job| job.font_selector.clone())
            .ok_or_else(|| not_found(id))
    }

    /// Remove a finished job and hand its files to the caller.
    ///
    /// Fails with `NotFound` for unknown (or already consumed) ids and with
    /// `Conflict` while the job is still running; in the latter case the job
    /// stays registered.
    pub async fn consume(&self, id: &str) -> CoreResult<JobResources> {
        let mut jobs = self.jobs.lock().await;
        let status = jobs.get(id).map(|job| job.status).ok_or_else(|| not_found(id))?;
        if !status.is_terminal() {
            return Err(CoreError::Conflict(format!("Job {id} is still running")));
        }
        jobs.remove(id)
            .map(JobEntry::into_resources)
            .ok_or_else(|| not_found(id))
    }

    /// Remove every job that has outlived its TTL at `now`.
    ///
    /// The caller owns the returned resources and is expected to delete
    /// them outside the lock.
    pub async fn reap_expired(&self, now: Timestamp, ttl: &JobTtl) -> Vec<(JobId, JobResources)> {
        let mut jobs = self.jobs.lock().await;
        let expired: Vec<JobId> = jobs
            .iter()
            .filter(|(_, job)| job.is_expired(now, ttl))
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| {
                let job = jobs.remove(&id)?;
                Some((id, job.into_resources()))
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}
