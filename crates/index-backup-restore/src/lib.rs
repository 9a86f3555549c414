// Backup tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # Index Backup & Restore
//!
//! `index-backup-restore` is a CLI tool and library that copies a search
//! index, schema and documents, to another index (possibly on another
//! service) through local staging files.
//!
//! ## Pipeline
//!
//! | Step | What happens |
//! |------|--------------|
//! | Capture schema | source schema saved to `<index>.schema` |
//! | Export | documents written to `<index>1.json`, `<index>2.json`, ... |
//! | Recreate | target index deleted (if present) and created from the schema |
//! | Import | each staging file uploaded unchanged |
//! | Verify | source and target document counts compared |
//!
//! ## Quick Start
//!
//! ```bash
//! # Full backup and restore
//! index-backup-restore run --config backup.yaml
//!
//! # Only snapshot the source
//! index-backup-restore backup --config backup.yaml
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! source:
//!   service: my-search
//!   index: hotels
//!
//! target:
//!   service: my-other-search
//!   index: hotels-copy
//!
//! staging:
//!   directory: ./backup
//!
//! options:
//!   batch_size: 500
//!   parallelism: 5
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod pipeline;
pub mod schema;
pub mod service;
pub mod staging;

pub use config::{RunConfig, RunOptions, ServiceConfig};
pub use error::{Error, Result};
pub use export::{plan_batches, Batch, BatchExporter, ExportReport};
pub use import::{BatchImporter, ImportReport};
pub use pipeline::{Pipeline, RunReport, Stage, Verification};
pub use schema::{DeleteOutcome, IndexSchema, SchemaTransport};
pub use service::{Document, SearchService};
