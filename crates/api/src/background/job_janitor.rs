//! Periodic expiry of generation jobs.
//!
//! Finished jobs that were never downloaded and running jobs that stopped
//! reporting progress are removed together with their output directory and
//! uploads. Runs on a fixed interval using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use certgen_jobs::{janitor, JobRegistry, JobTtl};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// Run the job janitor loop until `cancel` is triggered.
pub async fn run(
    registry: Arc<JobRegistry>,
    ttl: JobTtl,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = every.as_secs(),
        ttl_secs = ttl.finished.num_seconds(),
        stale_secs = ttl.stale.num_seconds(),
        "Job janitor started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job janitor stopping");
                break;
            }
            _ = interval.tick() => {
                let reaped = janitor::sweep(&registry, Utc::now(), &ttl).await;
                if reaped > 0 {
                    tracing::info!(reaped, "Job janitor: expired jobs removed");
                } else {
                    tracing::debug!("Job janitor: nothing to expire");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(JobRegistry::new(dir.path()));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            registry,
            JobTtl::default(),
            Duration::from_secs(60),
            cancel.clone(),
        ));
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("janitor should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn first_tick_sweeps_expired_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("data.csv");
        std::fs::write(&upload, b"name\nAlice\n").unwrap();

        let registry = Arc::new(JobRegistry::new(dir.path().join("outputs")));
        let id = registry.create(1, vec![upload.clone()], None).await;
        registry
            .finish(&id, certgen_jobs::JobOutcome::Done)
            .await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::clone(&registry),
            JobTtl::from_secs(-1, -1),
            Duration::from_secs(60),
            cancel.clone(),
        ));

        for _ in 0..50 {
            if registry.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cancel.cancel();
        handle.await.unwrap();

        assert!(registry.is_empty().await);
        assert!(!upload.exists());
    }
}
