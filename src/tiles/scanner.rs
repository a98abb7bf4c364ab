use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Suffix of the per-zoom metadata sidecar written next to tiled images
pub const METADATA_EXTENSION: &str = "meta";
/// Suffix of standalone JPEG2000 images
pub const JP2_EXTENSION: &str = "jp2";

/// Stems discovered under a root directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Metadata file paths with `.meta` removed
    pub metadata_stems: BTreeSet<PathBuf>,
    /// JPEG2000 file paths with `.jp2` removed
    pub standalone_stems: BTreeSet<PathBuf>,
}

/// Walk `root` recursively and classify every file by its suffix.
///
/// Tile payload files are ignored here; they are discovered per image
/// by the pipeline once the image row exists.
pub fn scan(root: &Path) -> ScanResult {
    let mut result = ScanResult::default();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(METADATA_EXTENSION) => {
                result.metadata_stems.insert(path.with_extension(""));
            }
            Some(JP2_EXTENSION) => {
                result.standalone_stems.insert(path.with_extension(""));
            }
            _ => {}
        }
    }

    debug!(
        root = %root.display(),
        metadata = result.metadata_stems.len(),
        jp2 = result.standalone_stems.len(),
        "Scan finished"
    );

    result
}
