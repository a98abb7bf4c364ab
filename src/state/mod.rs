/// State management module
///
/// This module handles the catalog database:
/// - Database connection and statements (library.rs)
/// - Row types shared with the ingestion pipeline (data.rs)

pub mod library;
pub mod data;
