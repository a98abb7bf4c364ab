//! Ingestion pipeline: turns a scanned tree into `image` and `tile` rows.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::ids::IdAllocator;
use super::measurements::MeasurementTable;
use crate::config::Config;
use crate::error::{IngestError, ParseError};
use crate::state::data::{ImageRecord, TileRecord};
use crate::state::library::Library;
use crate::tiles::filename::{file_name_str, parse_jp2, parse_tiled, FilenameDescriptor};
use crate::tiles::grouper::group;
use crate::tiles::scanner::{ScanResult, JP2_EXTENSION, METADATA_EXTENSION};
use crate::tiles::storage::{StorageTargets, TileLocation};

/// Result of handling one image or tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// Input was unusable (bad name, unknown measurement); nothing written
    Skipped { reason: String },
    /// Input was fine but the write did not happen
    Failed { reason: String },
}

impl From<IngestError> for Outcome {
    fn from(e: IngestError) -> Self {
        let reason = e.to_string();
        match e {
            IngestError::Parse(_) | IngestError::UnknownMeasurement { .. } => {
                Outcome::Skipped { reason }
            }
            _ => Outcome::Failed { reason },
        }
    }
}

/// Counts for one kind of record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Tally {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Ok => self.processed += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn attempted(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}

/// What one run discovered and wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Distinct tiled images found through their metadata files
    pub tiled_found: usize,
    /// JPEG2000 files found
    pub standalone_found: usize,
    /// Metadata files whose names could not be parsed
    pub rejected_metadata: usize,
    pub standalone: Tally,
    pub tiled: Tally,
    pub tiles: Tally,
    /// Zoom levels whose tile count differs from the expected grid size
    pub incomplete_zoom_levels: usize,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.standalone.failed + self.tiled.failed + self.tiles.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Found {} regular images and {} jp2 images ({} unreadable metadata files).",
            self.tiled_found, self.standalone_found, self.rejected_metadata
        )?;
        for (label, tally) in [
            ("jp2 images", self.standalone),
            ("tiled images", self.tiled),
            ("tiles", self.tiles),
        ] {
            writeln!(
                f,
                "  {:<13} {} attempted, {} processed, {} skipped, {} failed",
                label,
                tally.attempted(),
                tally.processed,
                tally.skipped,
                tally.failed
            )?;
        }
        write!(f, "  {} incomplete zoom levels", self.incomplete_zoom_levels)
    }
}

/// Number of tiles a complete zoom level consists of.
///
/// Zoom levels 10 and above are a 2x2 grid; each level below
/// that quadruples the count.
pub fn expected_tile_count(zoom: u32) -> usize {
    if zoom >= 10 {
        4
    } else {
        4usize.pow(11 - zoom)
    }
}

/// Writes discovered images and tiles through one catalog connection
#[derive(Debug)]
pub struct Pipeline<'a> {
    library: &'a Library,
    targets: StorageTargets,
}

impl<'a> Pipeline<'a> {
    pub fn new(library: &'a Library, targets: StorageTargets) -> Self {
        Self { library, targets }
    }

    pub fn from_config(config: &Config, library: &'a Library) -> Self {
        Self::new(
            library,
            StorageTargets::new(config.storage_mode, config.base_url.clone()),
        )
    }

    /// Ingest everything in `scan`.
    ///
    /// Only measurement resolution and id allocation can fail the run.
    /// Per-record problems are counted in the summary and the run continues.
    pub fn run(&self, scan: &ScanResult) -> Result<RunSummary, IngestError> {
        let measurements = MeasurementTable::load(self.library)?;
        if measurements.is_empty() {
            warn!("Measurement table is empty; every image will be skipped");
        }
        let ids = IdAllocator::from_library(self.library)?;
        info!(
            measurements = measurements.len(),
            first_id = ids.peek(),
            mode = self.targets.mode().as_str(),
            "Starting ingestion"
        );
        let grouping = group(&scan.metadata_stems);

        let mut run = Run {
            library: self.library,
            targets: &self.targets,
            measurements,
            ids,
            summary: RunSummary {
                tiled_found: grouping.groups.len(),
                standalone_found: scan.standalone_stems.len(),
                rejected_metadata: grouping.rejected.len(),
                ..RunSummary::default()
            },
        };

        for (stem, e) in &grouping.rejected {
            warn!(path = %stem.display(), error = %e, "Skipping metadata file");
        }

        info!(
            "Found {} regular images and {} jp2 images",
            run.summary.tiled_found, run.summary.standalone_found
        );

        for stem in &scan.standalone_stems {
            let outcome = run.standalone(stem);
            log_outcome("jp2 image", stem, &outcome);
            run.summary.standalone.record(&outcome);
        }

        for (key, zooms) in &grouping.groups {
            let outcome = run.tiled(key, zooms);
            log_outcome("image", key, &outcome);
            run.summary.tiled.record(&outcome);
        }

        Ok(run.summary)
    }
}

/// State carried through a single run
struct Run<'p> {
    library: &'p Library,
    targets: &'p StorageTargets,
    measurements: MeasurementTable,
    ids: IdAllocator,
    summary: RunSummary,
}

impl Run<'_> {
    fn standalone(&mut self, stem: &Path) -> Outcome {
        let result = file_name_str(stem)
            .and_then(parse_jp2)
            .map_err(IngestError::from)
            .and_then(|descriptor| self.commit_image(&descriptor, JP2_EXTENSION));

        match result {
            Ok(_) => Outcome::Ok,
            Err(e) => e.into(),
        }
    }

    fn tiled(&mut self, key: &Path, zooms: &BTreeSet<String>) -> Outcome {
        let (stem, descriptor) = match file_name_str(key)
            .and_then(|stem| parse_tiled(stem).map(|descriptor| (stem, descriptor)))
        {
            Ok(parsed) => parsed,
            Err(e) => return IngestError::from(e).into(),
        };

        // Tiles are only attempted once their parent row exists
        let image_id = match self.commit_image(&descriptor, descriptor.tile_extension()) {
            Ok(id) => id,
            Err(e) => return e.into(),
        };

        let files = match tile_files(key) {
            Ok(files) => files,
            Err(e) => {
                warn!(path = %key.display(), error = %e, "Could not list tile files");
                self.summary.tiles.failed += 1;
                return Outcome::Ok;
            }
        };

        let mut per_zoom: BTreeMap<u32, usize> = BTreeMap::new();
        for path in &files {
            let outcome = match self.tile(path, &descriptor, stem, image_id) {
                Ok(zoom) => {
                    *per_zoom.entry(zoom).or_default() += 1;
                    Outcome::Ok
                }
                Err(e) => e.into(),
            };
            log_outcome("tile", path, &outcome);
            self.summary.tiles.record(&outcome);
        }

        for zoom in zooms.iter().filter_map(|zoom| zoom.parse::<u32>().ok()) {
            let found = per_zoom.get(&zoom).copied().unwrap_or(0);
            let expected = expected_tile_count(zoom);
            if found != expected {
                warn!(
                    image = stem,
                    zoom,
                    found,
                    expected,
                    "Zoom level has an unexpected number of tiles"
                );
                self.summary.incomplete_zoom_levels += 1;
            }
        }

        Outcome::Ok
    }

    /// Insert the image row and consume its id only once the insert succeeded
    fn commit_image(
        &mut self,
        descriptor: &FilenameDescriptor,
        file_type: &'static str,
    ) -> Result<i64, IngestError> {
        let measurement_id = self.measurements.lookup(&descriptor.measurement_key())?;

        let image = ImageRecord {
            id: self.ids.peek(),
            measurement_id,
            timestamp: descriptor.timestamp,
            file_type,
        };
        self.library.insert_image(&image)?;

        Ok(self.ids.next_id())
    }

    /// Insert one tile row, returning its zoom level
    fn tile(
        &self,
        path: &Path,
        image: &FilenameDescriptor,
        stem: &str,
        image_id: i64,
    ) -> Result<u32, IngestError> {
        let name = file_name_str(path)?;
        let parsed = parse_tiled(name)?;
        let (Some(zoom), Some(x), Some(y)) = (parsed.zoom_level, parsed.tile_x, parsed.tile_y)
        else {
            return Err(ParseError::NotTileName { name: name.to_string() }.into());
        };

        let content = if self.targets.mode().stores_content() {
            Some(std::fs::read(path)?)
        } else {
            None
        };

        let location = TileLocation {
            image,
            stem,
            zoom,
            x,
            y,
            extension: image.tile_extension(),
        };
        let payload = self.targets.resolve(&location, content)?;

        self.library.insert_tile(&TileRecord {
            image_id,
            x,
            y,
            zoom_level: zoom,
            payload,
        })?;

        Ok(zoom)
    }
}

/// Tile files of the image at `key`: siblings named `{stem}_*` that are
/// neither metadata nor JPEG2000 files
fn tile_files(key: &Path) -> std::io::Result<Vec<PathBuf>> {
    let dir = match key.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = match key.file_name().and_then(|name| name.to_str()) {
        Some(name) => format!("{}_", name),
        None => return Ok(Vec::new()),
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        let matches_image = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(&prefix));
        let is_sidecar = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some(METADATA_EXTENSION) | Some(JP2_EXTENSION)
        );

        if matches_image && !is_sidecar && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn log_outcome(kind: &str, path: &Path, outcome: &Outcome) {
    match outcome {
        Outcome::Ok => debug!(path = %path.display(), "Processed {}", kind),
        Outcome::Skipped { reason } => {
            warn!(path = %path.display(), reason = %reason, "Skipped {}", kind)
        }
        Outcome::Failed { reason } => {
            error!(path = %path.display(), reason = %reason, "Failed to store {}", kind)
        }
    }
}
