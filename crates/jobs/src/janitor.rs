//! Expiry of abandoned and undownloaded jobs.
//!
//! [`sweep`] is one pass; the server runs it on a fixed interval.

use certgen_core::types::Timestamp;

use crate::registry::{JobRegistry, JobTtl};

/// Remove every job expired at `now` and delete its files.
///
/// Entries are removed under the registry lock first; file deletion happens
/// afterwards on the blocking pool. Returns the number of jobs reaped.
pub async fn sweep(registry: &JobRegistry, now: Timestamp, ttl: &JobTtl) -> usize {
    let reaped = registry.reap_expired(now, ttl).await;
    if reaped.is_empty() {
        return 0;
    }

    let count = reaped.len();
    for (job_id, _) in &reaped {
        tracing::info!(job_id = %job_id, "Janitor: expiring job");
    }

    let released = tokio::task::spawn_blocking(move || {
        for (_, resources) in reaped {
            resources.release();
        }
    })
    .await;

    if let Err(e) = released {
        tracing::warn!(error = %e, "Janitor: cleanup task failed");
    }

    count
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::registry::JobOutcome;

    #[tokio::test]
    async fn stale_running_job_is_reaped_with_its_files() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = vec![dir.path().join("template.png"), dir.path().join("data.csv")];
        for upload in &uploads {
            std::fs::write(upload, b"x").unwrap();
        }

        let registry = Arc::new(JobRegistry::new(dir.path().join("outputs")));
        let id = registry.create(10, uploads.clone(), None).await;
        let output_dir = registry.output_dir(&id).await.unwrap();
        std::fs::create_dir_all(&output_dir).unwrap();
        std::fs::write(output_dir.join("generated_0.png"), b"png").unwrap();

        let ttl = JobTtl::default();
        let later = Utc::now() + ttl.stale + Duration::seconds(1);
        assert_eq!(sweep(&registry, later, &ttl).await, 1);

        assert!(registry.read(&id).await.is_err());
        assert!(!output_dir.exists());
        for upload in &uploads {
            assert!(!upload.exists(), "{} should be deleted", upload.display());
        }
    }

    #[tokio::test]
    async fn sweep_leaves_live_jobs_alone() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("data.csv");
        std::fs::write(&upload, b"x").unwrap();

        let registry = JobRegistry::new(dir.path().join("outputs"));
        let id = registry.create(1, vec![upload.clone()], None).await;
        registry.finish(&id, JobOutcome::Done).await;

        assert_eq!(sweep(&registry, Utc::now(), &JobTtl::default()).await, 0);
        assert!(registry.read(&id).await.is_ok());
        assert!(upload.exists());
    }

    #[tokio::test]
    async fn missing_files_do_not_break_the_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JobRegistry::new(dir.path().join("outputs"));
        let id = registry
            .create(1, vec![dir.path().join("never-uploaded.png")], None)
            .await;
        registry.finish(&id, JobOutcome::Failed("bad".into())).await;

        let ttl = JobTtl::from_secs(0, 0);
        let later = Utc::now() + Duration::seconds(1);
        assert_eq!(sweep(&registry, later, &ttl).await, 1);
        assert!(registry.is_empty().await);
    }
}
