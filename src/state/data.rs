//! Shared data structures for the catalog
//!
//! These structs represent the rows that flow between
//! the ingestion pipeline and the database layer.

use chrono::NaiveDateTime;

/// A row of the `image` table
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Allocated by the pipeline, never by the database
    pub id: i64,
    /// Foreign key into `measurement`
    pub measurement_id: i64,
    /// Observation time decoded from the filename
    pub timestamp: NaiveDateTime,
    /// "jp2", "jpg" or "png"
    pub file_type: &'static str,
}

/// Where a tile's image data lives
///
/// There is no variant without either field: every storage mode
/// stores at least one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TilePayload {
    Url(String),
    Content(Vec<u8>),
    Both { url: String, content: Vec<u8> },
}

impl TilePayload {
    pub fn url(&self) -> Option<&str> {
        match self {
            TilePayload::Url(url) | TilePayload::Both { url, .. } => Some(url),
            TilePayload::Content(_) => None,
        }
    }

    pub fn content(&self) -> Option<&[u8]> {
        match self {
            TilePayload::Content(content) | TilePayload::Both { content, .. } => Some(content),
            TilePayload::Url(_) => None,
        }
    }
}

/// A row of the `tile` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    pub image_id: i64,
    pub x: u32,
    pub y: u32,
    pub zoom_level: u32,
    pub payload: TilePayload,
}

/// One row of the detector/measurement join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRow {
    /// NULL when the measurement has no matching detector
    pub detector: Option<String>,
    pub measurement: String,
    pub measurement_id: i64,
}
