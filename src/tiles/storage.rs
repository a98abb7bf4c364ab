//! Storage targets for tile payloads
//!
//! Tile images can be referenced by URL (served from a filesystem),
//! embedded in the database, or both. Image metadata is always stored
//! in the database regardless of mode.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;

use super::filename::FilenameDescriptor;
use crate::error::PayloadError;
use crate::state::data::TilePayload;

/// Where tile images should live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Tiles stay on disk, the catalog stores their URL
    Filesystem,
    /// Tile bytes are stored in the catalog
    Database,
    /// Both URL and bytes are stored
    Both,
}

impl StorageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageMode::Filesystem => "filesystem",
            StorageMode::Database => "database",
            StorageMode::Both => "both",
        }
    }

    pub fn stores_url(self) -> bool {
        matches!(self, StorageMode::Filesystem | StorageMode::Both)
    }

    pub fn stores_content(self) -> bool {
        matches!(self, StorageMode::Database | StorageMode::Both)
    }
}

/// Everything needed to name one tile on the tile server
#[derive(Debug, Clone, Copy)]
pub struct TileLocation<'a> {
    /// Descriptor of the parent image
    pub image: &'a FilenameDescriptor,
    /// File stem of the parent image, without zoom suffix
    pub stem: &'a str,
    pub zoom: u32,
    pub x: u32,
    pub y: u32,
    pub extension: &'a str,
}

impl TileLocation<'_> {
    /// Path relative to the tile server root:
    /// `YYYY/MM/DD/HH/OBS/INST/DET/MEAS/{stem}_{zoom}_{x}_{y}.{ext}`
    pub fn relative_path(&self) -> String {
        let d = self.image;
        format!(
            "{}/{:02}/{:02}/{:02}/{}/{}/{}/{}/{}_{:02}_{:03}_{:03}.{}",
            d.year,
            d.month,
            d.day,
            d.hour,
            d.observatory,
            d.instrument,
            d.detector,
            d.measurement,
            self.stem,
            self.zoom,
            self.x,
            self.y,
            self.extension,
        )
    }
}

/// Decides which payload fields a tile row carries
#[derive(Debug, Clone)]
pub struct StorageTargets {
    mode: StorageMode,
    base_url: Option<Url>,
}

impl StorageTargets {
    /// `base_url` gets a trailing `/` so joins append rather than replace
    pub fn new(mode: StorageMode, base_url: Option<Url>) -> Self {
        let base_url = base_url.map(with_trailing_slash);
        Self { mode, base_url }
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Build the payload for one tile.
    ///
    /// `content` is only consulted when the mode stores bytes; callers may
    /// skip reading the file otherwise.
    pub fn resolve(
        &self,
        tile: &TileLocation<'_>,
        content: Option<Vec<u8>>,
    ) -> Result<TilePayload, PayloadError> {
        let url = if self.mode.stores_url() {
            let base = self.base_url.as_ref().ok_or(PayloadError::MissingUrl)?;
            Some(base.join(&tile.relative_path())?.to_string())
        } else {
            None
        };

        let content = if self.mode.stores_content() {
            Some(content.ok_or(PayloadError::MissingContent)?)
        } else {
            None
        };

        match (url, content) {
            (Some(url), Some(content)) => Ok(TilePayload::Both { url, content }),
            (Some(url), None) => Ok(TilePayload::Url(url)),
            (None, Some(content)) => Ok(TilePayload::Content(content)),
            // Every mode stores at least one of the two
            (None, None) => Err(PayloadError::MissingContent),
        }
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
