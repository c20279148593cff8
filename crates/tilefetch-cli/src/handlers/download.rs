//! Download command handlers.

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use tilefetch_core::{JobId, TransferError, TransferOutcome};
use tilefetch_download::DownloadService;
use tracing::{debug, warn};

use crate::catalog_file::FileCatalog;

/// Drive a download to its outcome, cancelling the job on Ctrl+C.
///
/// The download future keeps running after the signal so the session can
/// kill the tool and report the cancellation itself.
pub async fn run_cancellable<F>(
    service: &DownloadService,
    job_id: &JobId,
    download: F,
) -> Result<TransferOutcome, TransferError>
where
    F: Future<Output = Result<TransferOutcome, TransferError>>,
{
    tokio::pin!(download);
    tokio::select! {
        result = &mut download => return result,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Could not listen for Ctrl+C");
            } else {
                eprintln!("Cancelling {job_id}...");
                if let Err(e) = service.cancel(job_id) {
                    debug!(error = %e, "Job was no longer active");
                }
            }
        }
    }
    download.await
}

fn report(outcome: &TransferOutcome) {
    match outcome {
        TransferOutcome::Completed { result_path } => {
            eprintln!("✓ Downloaded to {}", result_path.display());
        }
        TransferOutcome::Cancelled => eprintln!("Download cancelled."),
        TransferOutcome::Failed { error } => eprintln!("✗ Download failed: {error}"),
    }
}

/// Execute `product`.
pub async fn execute_product(
    service: &DownloadService,
    slug: &str,
    release_id: i64,
    file_id: i64,
    catalog: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let catalog = FileCatalog::load(catalog)
        .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
    let job_id = JobId::from(file_id);
    let outcome = run_cancellable(
        service,
        &job_id,
        service.download_product(&catalog, slug, release_id, file_id, output),
    )
    .await?;
    report(&outcome);
    Ok(())
}

/// Job id a model download registers under.
fn model_job_id(name: &str) -> JobId {
    JobId::new(name.trim())
}

/// Execute `gguf`.
pub async fn execute_gguf(service: &DownloadService, url: &str, name: &str) -> Result<()> {
    let job_id = model_job_id(name);
    let outcome =
        run_cancellable(service, &job_id, service.download_gguf_model(url, name)).await?;
    report(&outcome);
    Ok(())
}

/// Execute `vllm`.
pub async fn execute_vllm(service: &DownloadService, url: &str, name: &str) -> Result<()> {
    let job_id = model_job_id(name);
    let outcome =
        run_cancellable(service, &job_id, service.download_vllm_model(url, name)).await?;
    report(&outcome);
    Ok(())
}
