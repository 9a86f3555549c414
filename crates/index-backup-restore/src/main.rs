//! Index backup & restore CLI
//!
//! CLI tool for copying a search index to another index through local files.
//! Pedantic lints relaxed for CLI ergonomics.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use index_backup_restore::{Pipeline, RunConfig, RunReport};

#[derive(Parser)]
#[command(name = "index-backup-restore")]
#[command(version)]
#[command(about = "Back up a search index to local files and restore it into another index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Batch size override
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Parallelism override
    #[arg(long, global = true)]
    parallelism: Option<usize>,

    /// Staging directory override
    #[arg(long, global = true, value_name = "DIR")]
    staging_dir: Option<PathBuf>,

    /// Source service API key
    #[arg(long, global = true, env = "SEARCH_SOURCE_API_KEY", hide_env_values = true)]
    source_api_key: Option<String>,

    /// Target service API key
    #[arg(long, global = true, env = "SEARCH_TARGET_API_KEY", hide_env_values = true)]
    target_api_key: Option<String>,

    /// Bearer token for both services (used when no API key is set)
    #[arg(long, global = true, env = "SEARCH_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up the source, recreate the target, restore and verify
    Run {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Capture the source schema and documents into the staging directory
    Backup {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Recreate the target index and upload the staging files
    Restore {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Compare source and target document counts
    Verify {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Generate example configuration
    Init {
        /// Output file path
        #[arg(short, long, default_value = "backup.yaml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Run { config } => {
            let mut pipeline = Pipeline::new(load_config(&cli, config)?)?;
            let report = pipeline.run().await?;
            print_report(&report);
        }
        Commands::Backup { config } => {
            let mut pipeline = Pipeline::new(load_config(&cli, config)?)?;
            let export = pipeline.backup().await?;
            println!("\nBackup complete");
            println!("   Files:     {}", export.files.len());
            println!(
                "   Documents: {} of {}",
                export.documents_written(),
                export.total_count
            );
            if let Some(gap) = export.gap() {
                println!("   Warning:   {}", gap);
            }
        }
        Commands::Restore { config } => {
            let mut pipeline = Pipeline::new(load_config(&cli, config)?)?;
            let (_, import) = pipeline.restore().await?;
            println!("\nRestore complete");
            println!("   Files:     {}", import.files.len());
            println!("   Documents: {}", import.documents());
        }
        Commands::Verify { config } => {
            let mut pipeline = Pipeline::new(load_config(&cli, config)?)?;
            let verification = pipeline.verify().await?;
            println!("\nSAFEGUARD CHECK: Source and target index counts should match");
            println!("   Source index contains {} docs", verification.source_count);
            println!("   Target index contains {} docs", verification.target_count);
        }
        Commands::Validate { config } => {
            let config = load_config(&cli, config)?;
            println!("Configuration is valid!");
            println!(
                "   Source:  {} / {}",
                config.source.service, config.source.index
            );
            println!(
                "   Target:  {} / {}",
                config.target.service, config.target.index
            );
            println!("   Staging: {}", config.staging.directory.display());
            println!(
                "   Batches: {} documents, {} concurrent",
                config.options.batch_size, config.options.parallelism
            );
        }
        Commands::Init { output } => {
            std::fs::write(output, CONFIG_TEMPLATE)?;
            println!("Generated configuration: {}", output.display());
            println!(
                "   Edit the file and run: index-backup-restore run --config {}",
                output.display()
            );
        }
    }

    Ok(())
}

/// Loads, overrides and validates the configuration.
fn load_config(cli: &Cli, path: &Path) -> anyhow::Result<RunConfig> {
    info!("Loading configuration from {:?}", path);

    let mut config = RunConfig::from_file(path)?;

    if let Some(bs) = cli.batch_size {
        config.options.batch_size = bs;
    }
    if let Some(p) = cli.parallelism {
        config.options.parallelism = p;
    }
    if let Some(dir) = &cli.staging_dir {
        config.staging.directory = dir.clone();
    }
    if let Some(key) = &cli.source_api_key {
        config.source.api_key = Some(key.clone());
    }
    if let Some(key) = &cli.target_api_key {
        config.target.api_key = Some(key.clone());
    }
    if let Some(token) = &cli.bearer_token {
        for side in [&mut config.source, &mut config.target] {
            if side.bearer_token.is_none() {
                side.bearer_token = Some(token.clone());
            }
        }
    }

    config.validate()?;
    Ok(config)
}

fn print_report(report: &RunReport) {
    println!("\nBackup and restore complete");
    if let Some(export) = &report.export {
        println!(
            "   Exported:  {} of {} documents ({} files)",
            export.documents_written(),
            export.total_count,
            export.files.len()
        );
        for failure in &export.failed {
            println!(
                "   Failed:    batch {} -> {}: {}",
                failure.batch.sequence,
                failure.path.display(),
                failure.error
            );
        }
    }
    if let Some(import) = &report.import {
        println!("   Imported:  {} documents", import.documents());
    }
    if let Some(v) = &report.verification {
        println!("\nSAFEGUARD CHECK: Source and target index counts should match");
        println!("   Source index contains {} docs", v.source_count);
        println!("   Target index contains {} docs", v.target_count);
        if let Some(mismatch) = v.mismatch() {
            println!("   Warning: {}", mismatch);
        }
    }
    println!("   Duration:  {:.2}s", report.duration_secs);
}

const CONFIG_TEMPLATE: &str = r#"# Index backup & restore configuration
source:
  service: your-source-service   # <service>.search.windows.net
  index: your-index
  # api_key: admin-key           # or SEARCH_SOURCE_API_KEY
  # endpoint: https://custom-host

target:
  service: your-target-service
  index: your-index-copy
  # api_key: admin-key           # or SEARCH_TARGET_API_KEY

staging:
  directory: ./backup

options:
  batch_size: 500      # documents per file, at most 1000
  parallelism: 5       # concurrent batch exports
  verify:
    settle_secs: 10        # wait before comparing counts
    poll_timeout_secs: 0   # then poll the target until counts match (0 = off)
"#;
