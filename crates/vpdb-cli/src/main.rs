//! VPDB CLI: ingest, inspect, reprocess and remove files from the command line.
//!
//! Reads the same environment as the pipeline (DATABASE_URL, STORAGE_PATH, ...).

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;
use vpdb_cli::{guess_mime, log_error, wait_for_tasks, ErrorReport};
use vpdb_core::models::FileDescriptor;
use vpdb_core::{AppError, Config};
use vpdb_db::{connect, run_migrations, PgFileRepository};
use vpdb_infra::{init_telemetry, shutdown_telemetry, LogFormat};
use vpdb_processing::{DefaultExtractor, DefaultGenerator};
use vpdb_services::{CreateOptions, Pipeline};
use vpdb_storage::create_storage;
use vpdb_worker::TaskStatus;

#[derive(Parser)]
#[command(name = "vpdb", about = "VPDB file pipeline CLI")]
struct Cli {
    /// Seconds to wait for background variation processing
    #[arg(long, global = true, default_value = "300")]
    wait_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file and generate its variations
    Ingest {
        /// Path to the file
        path: PathBuf,
        /// File type: backglass, logo, playfield, playfield-fs, playfield-ws, release, rom
        #[arg(long = "type")]
        file_type: String,
        /// MIME type; guessed from the extension when omitted
        #[arg(long)]
        mime: Option<String>,
        /// Owner UUID
        #[arg(long)]
        owner: Uuid,
    },
    /// Print a file record
    Show {
        /// Short file id
        id: String,
    },
    /// Regenerate every variation of a file
    Reprocess {
        /// Short file id
        id: String,
    },
    /// Delete a file and all of its artifacts
    Remove {
        /// Short file id
        id: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    init_telemetry(LogFormat::from_config(&config))
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    let pool = connect(&config).await?;
    run_migrations(&pool).await?;

    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage")?;
    let extractor = Arc::new(DefaultExtractor::from_config(&config)?);
    let generator = Arc::new(DefaultGenerator::from_config(&config)?);
    let (finished_tx, mut finished_rx) = mpsc::channel(16);
    let pipeline = Pipeline::new(
        &config,
        Arc::new(PgFileRepository::new(pool)),
        storage,
        extractor,
        generator,
        Some(finished_tx),
    );
    let wait = Duration::from_secs(cli.wait_secs);

    let result = run(cli.command, &pipeline, &mut finished_rx, wait).await;
    pipeline.shutdown().await;

    if let Err(err) = result {
        match err.downcast_ref::<AppError>() {
            Some(app_error) => {
                log_error(app_error);
                let report = ErrorReport::new(app_error, config.is_production());
                eprintln!("{}", serde_json::to_string_pretty(&report)?);
            }
            None => {
                tracing::error!(error = %err, "Command failed");
                eprintln!("Error: {:#}", err);
            }
        }
        shutdown_telemetry().await;
        std::process::exit(1);
    }

    shutdown_telemetry().await;
    Ok(())
}

async fn run(
    command: Commands,
    pipeline: &Pipeline,
    finished_rx: &mut mpsc::Receiver<(Uuid, TaskStatus)>,
    wait: Duration,
) -> anyhow::Result<()> {
    match command {
        Commands::Ingest {
            path,
            file_type,
            mime,
            owner,
        } => {
            let mime_type = match mime {
                Some(mime) => mime,
                None => guess_mime(&path)
                    .map(str::to_string)
                    .with_context(|| format!("Cannot guess MIME type of {}, pass --mime", path.display()))?,
            };
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let content_length = file.metadata().await.ok().map(|m| m.len());
            let original_filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            let descriptor = FileDescriptor {
                file_type,
                mime_type,
                original_filename,
                owner_id: owner,
                content_length,
            };
            let record = pipeline
                .store
                .create(&descriptor, file, CreateOptions::default())
                .await?;
            wait_for_tasks(finished_rx, 1, wait).await;
            print_json(&pipeline.store.get_by_internal_id(record.internal_id).await?)?;
        }
        Commands::Show { id } => {
            print_json(&pipeline.store.get(&id).await?)?;
        }
        Commands::Reprocess { id } => {
            let record = pipeline.store.reprocess(&id).await?;
            wait_for_tasks(finished_rx, 1, wait).await;
            print_json(&pipeline.store.get_by_internal_id(record.internal_id).await?)?;
        }
        Commands::Remove { id } => {
            let record = pipeline.store.get(&id).await?;
            pipeline.store.remove(&record).await?;
            print_json(&serde_json::json!({ "removed": record.id }))?;
        }
    }

    Ok(())
}
