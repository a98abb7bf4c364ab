//! Error types for tile ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// A filename that does not follow one of the two naming grammars.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("filename is not valid UTF-8: {0}")]
    NotUtf8(PathBuf),

    #[error("unexpected length {len} for '{name}'")]
    Length { name: String, len: usize },

    #[error("invalid {field} in '{name}'")]
    Field { name: String, field: &'static str },

    #[error("expected '_' at offset {offset} in '{name}'")]
    Separator { name: String, offset: usize },

    #[error("'{name}' does not match the JPEG2000 naming pattern")]
    Jp2Pattern { name: String },

    #[error("'{name}' is not a valid calendar timestamp")]
    Timestamp { name: String },

    #[error("metadata stem '{name}' must end in a zoom level without tile coordinates")]
    NotMetadataStem { name: String },

    #[error("'{name}' is not a tile name with zoom level and coordinates")]
    NotTileName { name: String },
}

/// A tile whose storage targets cannot be produced for the configured mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("storage mode requires a base URL but none is configured")]
    MissingUrl,

    #[error("storage mode requires tile content but none was read")]
    MissingContent,

    #[error("could not build tile URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Errors raised while running the ingestion pipeline.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The measurement table could not be loaded; nothing can be inserted.
    #[error("failed to resolve measurements: {0}")]
    Resolution(String),

    #[error("no measurement registered for key '{key}'")]
    UnknownMeasurement { key: String },

    #[error("store rejected write: {0}")]
    StoreWrite(#[from] rusqlite::Error),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// Invalid configuration, detected before the pipeline starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no root directory given")]
    MissingRoot,

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("a base URL is required for storage mode '{0}'")]
    MissingBaseUrl(&'static str),

    #[error("malformed base URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("could not determine a default database location")]
    NoDataDir,
}
