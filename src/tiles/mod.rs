/// Tile discovery module
///
/// This module handles:
/// - Parsing image, metadata and tile filenames
/// - Scanning a directory tree for metadata and JPEG2000 files
/// - Grouping metadata files into images with their zoom levels
/// - Deciding where tile payloads are stored

pub mod filename;
pub mod grouper;
pub mod scanner;
pub mod storage;
