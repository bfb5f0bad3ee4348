//! Background execution of a single generation job.
//!
//! Rendering is blocking, so the row loop runs on the blocking pool and
//! reports each finished row over a channel; the async side turns those
//! reports into registry updates. The registry lock is never held while
//! rendering or writing files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use certgen_core::error::{CoreError, CoreResult};
use certgen_core::fonts::FontResolver;
use certgen_core::generation::{load_template, render_named_row, GenerationSettings};
use certgen_core::naming::OutputNamer;
use certgen_core::placement::PlacementPlan;
use certgen_core::table::load_table;
use certgen_core::types::JobId;
use image::ImageFormat;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::registry::{JobOutcome, JobRegistry};

/// Inputs of a background job, resolved by the request handler.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub template_path: PathBuf,
    pub data_path: PathBuf,
    pub headers_present: bool,
    pub plan: PlacementPlan,
    pub file_column: Option<String>,
}

/// Start a registered job on the runtime without waiting for it.
///
/// The job must already exist in `registry`.
pub fn spawn(
    registry: Arc<JobRegistry>,
    fonts: Arc<dyn FontResolver>,
    job_id: JobId,
    request: JobRequest,
) -> JoinHandle<()> {
    tokio::spawn(run(registry, fonts, job_id, request))
}

/// Run a job to completion and record its outcome.
pub async fn run(
    registry: Arc<JobRegistry>,
    fonts: Arc<dyn FontResolver>,
    job_id: JobId,
    request: JobRequest,
) {
    tracing::info!(job_id = %job_id, "Generation job started");

    let outcome = match execute(&registry, fonts, &job_id, request).await {
        Ok(rows) => {
            tracing::info!(job_id = %job_id, rows, "Generation job finished");
            JobOutcome::Done
        }
        Err(CoreError::NotFound { entity: "Job", .. }) => {
            tracing::debug!(job_id = %job_id, "Job vanished before it started");
            return;
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Generation job failed");
            JobOutcome::Failed(e.to_string())
        }
    };

    registry.finish(&job_id, outcome).await;
}

async fn execute(
    registry: &JobRegistry,
    fonts: Arc<dyn FontResolver>,
    job_id: &str,
    request: JobRequest,
) -> CoreResult<usize> {
    let output_dir = registry.output_dir(job_id).await?;
    let font_selector = registry.font_selector(job_id).await?;

    let (template, table) = {
        let request = request.clone();
        blocking(move || {
            let template = load_template(&request.template_path)?;
            let table = load_table(&request.data_path, request.headers_present)?;
            Ok((template, table))
        })
        .await?
    };

    claim_output_dir(registry, job_id, &output_dir).await?;

    let total = table.len();
    registry.set_total(job_id, total as u64).await;

    let settings = GenerationSettings {
        plan: request.plan,
        file_column: request.file_column,
        font_selector,
    };

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<usize>();

    let render_loop = blocking(move || {
        let mut namer = OutputNamer::new();
        for index in 0..table.len() {
            let (name, image) = render_named_row(
                &template,
                &table,
                index,
                &settings,
                fonts.as_ref(),
                &mut namer,
            )?;
            image.save_with_format(output_dir.join(&name), ImageFormat::Png)?;
            // The receiver only goes away if the job task was dropped.
            let _ = progress_tx.send(index);
        }
        Ok(table.len())
    });

    while progress_rx.recv().await.is_some() {
        registry.advance(job_id).await;
    }

    render_loop.await
}

/// Create the job's output directory, then confirm the job still exists.
///
/// The janitor may reap a job while its inputs are loading. A directory
/// created after that would never be cleaned up, so it is removed again and
/// the job reported missing.
async fn claim_output_dir(
    registry: &JobRegistry,
    job_id: &str,
    output_dir: &Path,
) -> CoreResult<()> {
    tokio::fs::create_dir_all(output_dir).await?;

    if let Err(e) = registry.output_dir(job_id).await {
        if let Err(io) = tokio::fs::remove_dir_all(output_dir).await {
            tracing::warn!(
                job_id = %job_id,
                error = %io,
                "Failed to remove orphaned output directory"
            );
        }
        return Err(e);
    }
    Ok(())
}

/// Run blocking work on the blocking pool, flattening join errors.
async fn blocking<T, F>(f: F) -> CoreResult<T>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::Internal(format!("Blocking task failed: {e}")))?
}
