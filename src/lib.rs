//! Tile catalog ingestion.
//!
//! Scans a directory of pre-rendered image tiles and JPEG2000 images,
//! decodes their filenames and populates the `image` and `tile` tables
//! of a SQLite catalog.
//!
//! Only one ingestion run may write to a catalog at a time: image ids are
//! allocated by the run, not by the database.

pub mod config;
pub mod error;
pub mod ingest;
pub mod state;
pub mod tiles;

pub use config::{CliArgs, Config};
pub use error::{ConfigError, IngestError, ParseError, PayloadError};
pub use ingest::pipeline::{Outcome, Pipeline, RunSummary, Tally};
pub use state::library::Library;
pub use tiles::scanner::{scan, ScanResult};
pub use tiles::storage::{StorageMode, StorageTargets};
