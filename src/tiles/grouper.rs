use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::filename::{file_name_str, parse_tiled, IMAGE_STEM_LEN};
use crate::error::ParseError;

/// Metadata stems folded into images, keyed by path without the zoom suffix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouping {
    /// Image key -> two-digit zoom suffixes found on disk
    pub groups: BTreeMap<PathBuf, BTreeSet<String>>,
    /// Stems that failed to parse, with the reason
    pub rejected: Vec<(PathBuf, ParseError)>,
}

/// Group metadata stems (`.../IMAGE_ZZ`) into one entry per image.
///
/// Every stem must parse as a tiled name carrying a zoom level and no tile
/// coordinates. Anything else ends up in `rejected`.
pub fn group(metadata_stems: &BTreeSet<PathBuf>) -> Grouping {
    let mut grouping = Grouping::default();

    for stem in metadata_stems {
        match image_key(stem) {
            Ok((key, zoom)) => {
                grouping.groups.entry(key).or_default().insert(zoom);
            }
            Err(e) => grouping.rejected.push((stem.clone(), e)),
        }
    }

    grouping
}

fn image_key(stem: &Path) -> Result<(PathBuf, String), ParseError> {
    let name = file_name_str(stem)?;
    let descriptor = parse_tiled(name)?;

    // The zoom suffix is taken from the raw name, so nothing may trail it
    if name.contains('.') || descriptor.zoom_level.is_none() || descriptor.tile_x.is_some() {
        return Err(ParseError::NotMetadataStem { name: name.to_string() });
    }

    // Parsing guarantees `IMAGE_ + ZZ`, all ASCII
    let image = &name[..IMAGE_STEM_LEN];
    let zoom = &name[IMAGE_STEM_LEN + 1..];

    Ok((stem.with_file_name(image), zoom.to_string()))
}
