//! Sequential upload of staged batch files.

use std::path::Path;

use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::service::SearchService;
use crate::staging::{self, StagingFile};

/// Outcome of an import.
#[derive(Debug, Default, Clone)]
pub struct ImportReport {
    /// Files uploaded, in upload order.
    pub files: Vec<StagingFile>,
}

impl ImportReport {
    /// Documents uploaded.
    #[must_use]
    pub fn documents(&self) -> u64 {
        self.files.iter().map(|f| f.documents as u64).sum()
    }
}

/// Uploads the staging files of one source index to a target index.
pub struct BatchImporter<'a> {
    service: &'a dyn SearchService,
    target_index: &'a str,
    progress: ProgressBar,
}

impl<'a> BatchImporter<'a> {
    /// Creates an importer writing into `target_index` on `service`.
    pub fn new(service: &'a dyn SearchService, target_index: &'a str) -> Self {
        Self {
            service,
            target_index,
            progress: ProgressBar::hidden(),
        }
    }

    /// Reports uploaded documents on `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Uploads every batch file of `source_index` found in `staging_dir`.
    ///
    /// Files are uploaded one at a time and unchanged.
    ///
    /// # Errors
    ///
    /// Stops at the first file that cannot be read or uploaded; files already
    /// uploaded stay in the target.
    pub async fn import_all(&self, staging_dir: &Path, source_index: &str) -> Result<ImportReport> {
        let files = staging::list_batch_files(staging_dir, source_index)?;
        if files.is_empty() {
            warn!(
                "No batch files of '{}' found in {}",
                source_index,
                staging_dir.display()
            );
            return Ok(ImportReport::default());
        }

        info!(
            "Uploading {} batch file(s) of '{}' to index '{}' on '{}'",
            files.len(),
            source_index,
            self.target_index,
            self.service.service_name()
        );

        let mut report = ImportReport::default();
        for (sequence, path) in files {
            let file = self.import_file(sequence, &path).await?;
            report.files.push(file);
        }

        info!(
            "Uploaded {} documents from {} file(s)",
            report.documents(),
            report.files.len()
        );
        Ok(report)
    }

    /// Uploads one staging file.
    ///
    /// # Errors
    ///
    /// Returns an error naming the file if it cannot be read, is not an
    /// envelope, or is rejected by the service.
    pub async fn import_file(&self, sequence: u64, path: &Path) -> Result<StagingFile> {
        info!("  - Uploading documents from file {}", path.display());

        let bytes = staging::read_file(path)?;
        let documents = codec::count_records(&bytes).map_err(|e| Error::staging(path, e))?;
        let body = codec::decode_for_import(bytes);

        self.service
            .upload_documents(self.target_index, body)
            .await
            .map_err(|e| Error::Import {
                path: path.to_path_buf(),
                source: Box::new(e),
            })?;
        self.progress.inc(documents as u64);

        Ok(StagingFile {
            sequence,
            path: path.to_path_buf(),
            documents,
        })
    }
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
