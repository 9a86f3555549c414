//! Batched, concurrent export of documents into staging files.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::service::SearchService;
use crate::staging::{self, StagingFile};

/// A window `[offset, offset + size)` over the source documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// 1-based sequence number, used in the staging file name.
    pub sequence: u64,
    /// Index of the first document.
    pub offset: u64,
    /// Number of documents requested.
    pub size: usize,
}

/// Splits `total` documents into consecutive batches of at most `batch_size`.
///
/// Batches cover `[0, total)` exactly once; only the last may be short.
///
/// # Panics
///
/// Panics if `batch_size` is zero.
#[must_use]
pub fn plan_batches(total: u64, batch_size: usize) -> Vec<Batch> {
    assert!(batch_size > 0, "batch_size must be greater than 0");
    let step = batch_size as u64;

    (0..total.div_ceil(step))
        .map(|i| {
            let offset = i * step;
            Batch {
                sequence: i + 1,
                offset,
                size: (total - offset).min(step) as usize,
            }
        })
        .collect()
}

/// A batch that produced no staging file.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// The batch.
    pub batch: Batch,
    /// File that would have been written.
    pub path: PathBuf,
    /// Error message.
    pub error: String,
}

/// Outcome of exporting every batch.
#[derive(Debug, Default, Clone)]
pub struct ExportReport {
    /// Source document count the batches were planned from.
    pub total_count: u64,
    /// Files written, ordered by sequence.
    pub files: Vec<StagingFile>,
    /// Failed batches, ordered by sequence.
    pub failed: Vec<BatchFailure>,
}

impl ExportReport {
    /// Documents written to staging.
    #[must_use]
    pub fn documents_written(&self) -> u64 {
        self.files.iter().map(|f| f.documents as u64).sum()
    }

    /// True when every batch was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The gap left by failed batches, if any.
    #[must_use]
    pub fn gap(&self) -> Option<Error> {
        if self.failed.is_empty() {
            return None;
        }
        Some(Error::PartialExportGap {
            failed_batches: self.failed.len(),
            missing_documents: self.failed.iter().map(|f| f.batch.size as u64).sum(),
        })
    }
}

/// Exports an index into staging files, `parallelism` batches at a time.
pub struct BatchExporter<'a> {
    service: &'a dyn SearchService,
    index: &'a str,
    staging_dir: &'a Path,
    batch_size: usize,
    parallelism: usize,
    progress: ProgressBar,
}

impl<'a> BatchExporter<'a> {
    /// Creates an exporter for `index` on `service`.
    pub fn new(
        service: &'a dyn SearchService,
        index: &'a str,
        staging_dir: &'a Path,
        batch_size: usize,
        parallelism: usize,
    ) -> Self {
        Self {
            service,
            index,
            staging_dir,
            batch_size: batch_size.max(1),
            parallelism: parallelism.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    /// Reports exported documents on `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Exports `total_count` documents.
    ///
    /// Batch failures are logged and collected in the report; they do not stop
    /// other batches. Batch files of this index from an earlier run are
    /// removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging directory cannot be prepared, or if a
    /// batch file name is also a batch of another index staged there. Nothing
    /// is removed or written in that case.
    pub async fn export_all(&self, total_count: u64) -> Result<ExportReport> {
        staging::ensure_dir(self.staging_dir)?;

        let batches = plan_batches(total_count, self.batch_size);
        if let Some((batch, other)) = batches.iter().find_map(|b| {
            staging::foreign_owner(self.staging_dir, self.index, b.sequence).map(|o| (b, o))
        }) {
            return Err(Error::staging(
                staging::batch_path(self.staging_dir, self.index, batch.sequence),
                format!(
                    "batch {} of '{}' has the same file name as a batch of '{}'; use a separate staging directory",
                    batch.sequence, self.index, other
                ),
            ));
        }

        let removed = staging::clear_batch_files(self.staging_dir, self.index)?;
        if removed > 0 {
            info!(
                "Removed {} stale batch file(s) of '{}' from {}",
                removed,
                self.index,
                self.staging_dir.display()
            );
        }

        info!(
            "Exporting {} documents of '{}' in {} batch(es) of {} ({} concurrent)",
            total_count,
            self.index,
            batches.len(),
            self.batch_size,
            self.parallelism
        );

        let results: Vec<(Batch, Result<StagingFile>)> = stream::iter(batches)
            .map(|batch| async move { (batch, self.export_batch(batch).await) })
            .buffer_unordered(self.parallelism)
            .collect()
            .await;

        let mut report = ExportReport {
            total_count,
            ..Default::default()
        };
        for (batch, result) in results {
            match result {
                Ok(file) => report.files.push(file),
                Err(e) => {
                    let path = staging::batch_path(self.staging_dir, self.index, batch.sequence);
                    error!(
                        "Export of batch {} (skip {}, size {}) to {} failed: {}",
                        batch.sequence,
                        batch.offset,
                        batch.size,
                        path.display(),
                        e
                    );
                    report.failed.push(BatchFailure {
                        batch,
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.files.sort_by_key(|f| f.sequence);
        report.failed.sort_by_key(|f| f.batch.sequence);

        if let Some(gap) = report.gap() {
            warn!("{}", gap);
        }
        Ok(report)
    }

    /// Fetches one batch and writes its staging file.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch, encoding or write fails.
    pub async fn export_batch(&self, batch: Batch) -> Result<StagingFile> {
        let path = staging::batch_path(self.staging_dir, self.index, batch.sequence);
        debug!(
            "Export to {} - skip {} STARTED",
            path.display(),
            batch.offset
        );

        let documents = self
            .service
            .fetch_page(self.index, batch.offset, batch.size)
            .await?;
        if documents.len() != batch.size {
            warn!(
                "Batch {} returned {} of {} requested documents",
                batch.sequence,
                documents.len(),
                batch.size
            );
        }

        let body = codec::encode_batch(&documents)?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || staging::write_atomic(&target, &body))
            .await
            .map_err(|e| Error::staging(&path, e))??;
        self.progress.inc(documents.len() as u64);

        debug!(
            "Export to {} - skip {} DONE ({} documents)",
            path.display(),
            batch.offset,
            documents.len()
        );

        Ok(StagingFile {
            sequence: batch.sequence,
            path,
            documents: documents.len(),
        })
    }
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;
