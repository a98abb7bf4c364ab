use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_ingest::{scan, CliArgs, Config, Library, Pipeline, RunSummary};

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tile_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    info!("Starting tile-ingest v{}", env!("CARGO_PKG_VERSION"));

    match run(&args) {
        Ok(summary) => {
            if summary.has_failures() {
                warn!("Some records could not be stored; see the log above");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load configuration, open the catalog and ingest the configured tree.
/// Only configuration, catalog and measurement errors end up here.
fn run(args: &CliArgs) -> Result<RunSummary> {
    let config = Config::load(args).context("Invalid configuration")?;

    if let Some(parent) = config.database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let library = Library::open(&config.database)
        .with_context(|| format!("Failed to open catalog {}", config.database.display()))?;

    info!(
        root = %config.root_directory.display(),
        mode = config.storage_mode.as_str(),
        "Scanning root directory"
    );
    let found = scan(&config.root_directory);

    let summary = Pipeline::from_config(&config, &library)
        .run(&found)
        .context("Ingestion aborted")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("📊 {}", summary);
    }

    match catalog_totals(&library) {
        Some((images, tiles)) => info!(catalog = ?library.path(), images, tiles, "✅ Finished"),
        None => info!(catalog = ?library.path(), "✅ Finished"),
    }

    Ok(summary)
}

/// Image and tile row counts for the closing log line.
/// The run has already committed, so a failed query is only logged.
fn catalog_totals(library: &Library) -> Option<(i64, i64)> {
    match (library.image_count(), library.tile_count()) {
        (Ok(images), Ok(tiles)) => Some((images, tiles)),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Could not count catalog rows");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_catalog_totals_survive_a_failed_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        let library = Library::open(&path).unwrap();
        assert_eq!(catalog_totals(&library), Some((0, 0)));

        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE tile;")
            .unwrap();

        assert_eq!(catalog_totals(&library), None);
    }
}
