//! Backup/restore pipeline orchestration.
//!
//! A full run moves through these stages, in order:
//!
//! ```text
//! Configure -> CaptureSchema -> ExportDocuments -> DeleteTargetIndex
//!           -> CreateTargetIndex -> ImportDocuments -> Verify -> Done
//! ```
//!
//! Any stage failure ends the run (a missing target index on delete is not a
//! failure). Nothing is rolled back: staging files and a deleted target index
//! stay as they are.

use std::fmt;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::export::{BatchExporter, ExportReport};
use crate::import::{BatchImporter, ImportReport};
use crate::schema::{DeleteOutcome, SchemaTransport};
use crate::service::{create_service, SearchService};

/// Interval between target count polls during verification.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Configuration loaded, nothing done yet.
    Configure,
    /// Fetching and saving the source schema.
    CaptureSchema,
    /// Writing source documents to staging files.
    ExportDocuments,
    /// Removing the target index.
    DeleteTargetIndex,
    /// Creating the target index from the captured schema.
    CreateTargetIndex,
    /// Uploading staging files to the target.
    ImportDocuments,
    /// Comparing source and target counts.
    Verify,
    /// Finished.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configure => "configure",
            Self::CaptureSchema => "capture schema",
            Self::ExportDocuments => "export documents",
            Self::DeleteTargetIndex => "delete target index",
            Self::CreateTargetIndex => "create target index",
            Self::ImportDocuments => "import documents",
            Self::Verify => "verify",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Source and target document counts after a restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    /// Documents in the source index.
    pub source_count: u64,
    /// Documents in the target index.
    pub target_count: u64,
}

impl Verification {
    /// True when both counts agree.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.source_count == self.target_count
    }

    /// The discrepancy, if any.
    #[must_use]
    pub fn mismatch(&self) -> Option<Error> {
        (!self.is_match()).then_some(Error::CountMismatch {
            source_count: self.source_count,
            target_count: self.target_count,
        })
    }
}

/// Summary of a run.
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    /// Export outcome.
    pub export: Option<ExportReport>,
    /// Whether a target index was deleted.
    pub delete: Option<DeleteOutcome>,
    /// Import outcome.
    pub import: Option<ImportReport>,
    /// Count comparison.
    pub verification: Option<Verification>,
    /// Duration in seconds.
    pub duration_secs: f64,
}

/// Backup/restore pipeline.
pub struct Pipeline {
    config: RunConfig,
    source: Box<dyn SearchService>,
    target: Box<dyn SearchService>,
    stage: Stage,
}

impl Pipeline {
    /// Create a pipeline talking to the configured REST services.
    ///
    /// # Errors
    ///
    /// Returns an error if a service client cannot be created.
    pub fn new(config: RunConfig) -> Result<Self> {
        let source = create_service(&config.source, &config)?;
        let target = create_service(&config.target, &config)?;
        Ok(Self::with_services(config, source, target))
    }

    /// Create a pipeline over explicit service implementations.
    pub fn with_services(
        config: RunConfig,
        source: Box<dyn SearchService>,
        target: Box<dyn SearchService>,
    ) -> Self {
        info!(
            "Source service and index: {}, {}",
            config.source.service, config.source.index
        );
        info!(
            "Target service and index: {}, {}",
            config.target.service, config.target.index
        );
        info!("Staging directory: {}", config.staging.directory.display());

        Self {
            config,
            source,
            target,
            stage: Stage::Configure,
        }
    }

    /// Current (or last reached) stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        info!("Stage: {}", stage);
        self.stage = stage;
    }

    /// Run every stage: backup, recreate target, restore, verify.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage. Export batch failures
    /// and a count mismatch are reported, not returned.
    pub async fn run(&mut self) -> Result<RunReport> {
        let start = Instant::now();
        let mut report = RunReport::default();

        info!("Starting index backup");
        let export = self.backup().await?;
        let staged = export.documents_written();
        report.export = Some(export);

        info!("Starting index restore");
        let (delete, import) = self.restore_with_total(staged).await?;
        report.delete = Some(delete);
        report.import = Some(import);

        report.verification = Some(self.verify().await?);
        self.enter(Stage::Done);

        report.duration_secs = start.elapsed().as_secs_f64();
        Ok(report)
    }

    /// Capture the source schema and export its documents to staging.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema or document count cannot be read, or
    /// the staging directory cannot be prepared.
    pub async fn backup(&mut self) -> Result<ExportReport> {
        let staging_dir = self.config.staging.directory.clone();
        let index = self.config.source.index.clone();

        self.enter(Stage::CaptureSchema);
        SchemaTransport::new(&staging_dir)
            .fetch_schema(self.source.as_ref(), &index)
            .await?;

        self.enter(Stage::ExportDocuments);
        let total = self.source.count_documents(&index).await?;
        let progress = create_progress_bar(total);
        let report = BatchExporter::new(
            self.source.as_ref(),
            &index,
            &staging_dir,
            self.config.options.batch_size,
            self.config.options.parallelism,
        )
        .with_progress(progress.clone())
        .export_all(total)
        .await?;
        progress.finish_and_clear();

        info!(
            "Exported {} of {} documents into {} file(s)",
            report.documents_written(),
            total,
            report.files.len()
        );
        Ok(report)
    }

    /// Recreate the target index from the captured schema and upload staging files.
    ///
    /// # Errors
    ///
    /// Returns the first delete, create or upload failure.
    pub async fn restore(&mut self) -> Result<(DeleteOutcome, ImportReport)> {
        self.restore_with_total(0).await
    }

    async fn restore_with_total(&mut self, staged: u64) -> Result<(DeleteOutcome, ImportReport)> {
        let staging_dir = self.config.staging.directory.clone();
        let source_index = self.config.source.index.clone();
        let target_index = self.config.target.index.clone();
        let transport = SchemaTransport::new(&staging_dir);

        self.enter(Stage::DeleteTargetIndex);
        let delete = transport
            .delete_index(self.target.as_ref(), &target_index)
            .await?;

        self.enter(Stage::CreateTargetIndex);
        let schema = transport.load_schema(&source_index)?;
        transport
            .create_index(self.target.as_ref(), &schema, &target_index)
            .await?;

        self.enter(Stage::ImportDocuments);
        let progress = create_progress_bar(staged);
        let import = BatchImporter::new(self.target.as_ref(), &target_index)
            .with_progress(progress.clone())
            .import_all(&staging_dir, &source_index)
            .await?;
        progress.finish_and_clear();

        Ok((delete, import))
    }

    /// Compare source and target document counts.
    ///
    /// Waits for the configured settle delay first, then optionally polls the
    /// target until the counts agree or the poll timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns an error only if a count cannot be read; a mismatch is logged.
    pub async fn verify(&mut self) -> Result<Verification> {
        self.enter(Stage::Verify);
        let verify = self.config.options.verify.clone();

        if !verify.settle_delay().is_zero() {
            info!(
                "Waiting {} seconds for target to index content before validating...",
                verify.settle_secs
            );
            tokio::time::sleep(verify.settle_delay()).await;
        }

        let source_count = self
            .source
            .count_documents(&self.config.source.index)
            .await?;
        let mut target_count = self
            .target
            .count_documents(&self.config.target.index)
            .await?;

        let deadline = Instant::now() + verify.poll_timeout();
        while target_count != source_count && Instant::now() < deadline {
            tokio::time::sleep(POLL_INTERVAL).await;
            target_count = self
                .target
                .count_documents(&self.config.target.index)
                .await?;
        }

        let verification = Verification {
            source_count,
            target_count,
        };
        info!("Source index contains {} docs", source_count);
        info!("Target index contains {} docs", target_count);
        if let Some(mismatch) = verification.mismatch() {
            warn!("{}", mismatch);
        }
        Ok(verification)
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pb
}
