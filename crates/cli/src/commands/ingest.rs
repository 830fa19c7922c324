//! File-driven snapshot ingestion.
//!
//! The file holds the same JSON document the `POST /universe/snapshots` and
//! `POST /prices/snapshots` routes accept.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use refdata_core::AppConfig;
use refdata_data::{Database, PriceSnapshotInput, UniverseSnapshotBuilder, UniverseSnapshotInput};
use refdata_services::{build_producer, IngestionService};
use serde::de::DeserializeOwned;
use uuid::Uuid;

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Tenant the snapshot belongs to
    #[arg(long)]
    pub tenant: Uuid,

    /// JSON snapshot document
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Reads and decodes a snapshot document.
fn read_input<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a valid snapshot document", path.display()))
}

async fn ingestion_service(config: &AppConfig) -> Result<IngestionService> {
    let db = Database::connect(&config.database).await?;
    let repos = db.repositories();
    let queue = build_producer(&config.queue)?;
    Ok(IngestionService::new(repos.universe, repos.prices, queue)
        .with_builder(UniverseSnapshotBuilder::new(config.universe.constituent_count)))
}

/// # Errors
/// Returns an error if the file is unreadable, the snapshot is rejected, or
/// storage or the queue fails.
pub async fn run_ingest_universe(config: AppConfig, args: IngestArgs) -> Result<()> {
    let input: UniverseSnapshotInput = read_input(&args.file)?;
    let service = ingestion_service(&config).await?;
    let result = service.ingest_universe(args.tenant, &input).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// # Errors
/// Returns an error if the file is unreadable, the snapshot is rejected, or
/// storage or the queue fails.
pub async fn run_ingest_prices(config: AppConfig, args: IngestArgs) -> Result<()> {
    let input: PriceSnapshotInput = read_input(&args.file)?;
    let service = ingestion_service(&config).await?;
    let result = service.ingest_prices(args.tenant, &input).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_universe_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"asOfDate":"2024-06-28","source":"spdj","effectiveAt":"2024-06-28T21:00:00Z","publishedAt":"2024-06-28T21:00:00Z","constituents":[]}}"#
        )
        .unwrap();

        let input: UniverseSnapshotInput = read_input(file.path()).unwrap();
        assert_eq!(input.source, "spdj");
        assert!(input.constituents.is_empty());
    }

    #[test]
    fn reports_missing_and_malformed_files() {
        let missing = read_input::<UniverseSnapshotInput>(Path::new("/nonexistent/universe.json"));
        assert!(missing.unwrap_err().to_string().contains("Failed to read"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let malformed = read_input::<PriceSnapshotInput>(file.path());
        assert!(malformed.unwrap_err().to_string().contains("not a valid snapshot document"));
    }
}
