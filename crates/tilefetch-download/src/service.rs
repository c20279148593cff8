//! Download facade used by frontends.
//!
//! Owns the registry, sink, and configuration and wires planning, tool
//! lookup, and the transfer session together.

use std::path::Path;
use std::sync::Arc;

use tilefetch_core::{AppConfig, CatalogPort, JobId, NotificationSink, TransferError, TransferOutcome};
use tracing::info;

use crate::engine::{ModelDownload, plan_gguf_download, plan_product_download, plan_vllm_download};
use crate::process::{locate_hf_cli, locate_om_cli};
use crate::registry::CancellationRegistry;
use crate::session::TransferSession;

/// Entry point for product and model downloads.
#[derive(Clone)]
pub struct DownloadService {
    session: TransferSession,
    config: AppConfig,
}

impl DownloadService {
    pub fn new(config: AppConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_session(config, TransferSession::new(CancellationRegistry::new(), sink))
    }

    /// Use a preconfigured session (shared registry, custom probe interval).
    #[must_use]
    pub const fn with_session(config: AppConfig, session: TransferSession) -> Self {
        Self { session, config }
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &CancellationRegistry {
        self.session.registry()
    }

    /// Download a product file with the vendor CLI into `save_path`, or the
    /// configured download location.
    ///
    /// Cancellation is reported as `Ok(TransferOutcome::Cancelled)`.
    pub async fn download_product(
        &self,
        catalog: &dyn CatalogPort,
        slug: &str,
        release_id: i64,
        file_id: i64,
        save_path: Option<&Path>,
    ) -> Result<TransferOutcome, TransferError> {
        let output_dir = save_path.unwrap_or(self.config.download_location.as_path());
        let plan = plan_product_download(
            catalog,
            &self.config.api_token,
            slug,
            release_id,
            file_id,
            output_dir,
        )
        .await?;
        let om = locate_om_cli(self.config.om_path.as_deref())?;

        info!(%slug, version = %plan.version, glob = %plan.file_glob, "Starting product download");
        self.session
            .run(plan.into_request(&om, &self.config.api_token))
            .await
            .into_result()
    }

    /// Download a GGUF model and merge its parts.
    pub async fn download_gguf_model(
        &self,
        url: &str,
        model_name: &str,
    ) -> Result<TransferOutcome, TransferError> {
        let plan = plan_gguf_download(
            &self.config.download_location,
            url,
            model_name,
            self.config.hf_token.as_deref(),
        )?;
        let cli = locate_hf_cli()?;
        self.run_model_download(plan, &cli).await
    }

    /// Download a vLLM model and pack it into a flat archive.
    pub async fn download_vllm_model(
        &self,
        url: &str,
        model_name: &str,
    ) -> Result<TransferOutcome, TransferError> {
        let plan = plan_vllm_download(
            &self.config.download_location,
            url,
            model_name,
            self.config.hf_token.as_deref(),
        )?;
        let cli = locate_hf_cli()?;
        self.run_model_download(plan, &cli).await
    }

    /// Run a planned model download with an explicit fetcher binary.
    pub async fn run_model_download(
        &self,
        plan: ModelDownload,
        cli: &Path,
    ) -> Result<TransferOutcome, TransferError> {
        info!(model = %plan.job_id, repo = %plan.repo, "Starting model download");
        self.session.run(plan.into_request(cli)).await.into_result()
    }

    /// Cancel an active job.
    pub fn cancel(&self, job_id: &JobId) -> Result<(), TransferError> {
        self.registry().signal(job_id)
    }

    /// Ids of the active jobs.
    #[must_use]
    pub fn active_jobs(&self) -> Vec<JobId> {
        self.registry().active_jobs()
    }
}
