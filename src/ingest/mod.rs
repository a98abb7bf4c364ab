/// Ingestion module
///
/// This module handles:
/// - Resolving measurement ids from the catalog
/// - Allocating image ids for a run
/// - Inserting images and tiles, with a per-record outcome and run summary

pub mod ids;
pub mod measurements;
pub mod pipeline;
