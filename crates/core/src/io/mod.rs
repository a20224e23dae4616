//! I/O operations for the pipeline's inputs and outputs
//!
//! Readers: ESRI shapefile boundaries, delimited point tables.
//! Writers: tab-delimited tables and single-band float GeoTIFF rasters.
//!
//! All writers stage their output into a temporary sibling file and rename
//! it into place, so a failed run never leaves a partially written file at
//! the destination path.

mod discover;
mod geotiff;
mod shapefile;
mod table;

pub use discover::{discover_inputs, DiscoveredInputs};
pub use geotiff::{read_geotiff, write_geotiff};
pub use shapefile::{read_polygon_shapefile, write_polygon_shapefile};
pub use table::{read_point_table, write_table, TableOptions};

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Staging path for atomic writes: a hidden sibling of the target.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    match path.parent() {
        Some(parent) => parent.join(format!(".{}.tmp", name)),
        None => PathBuf::from(format!(".{}.tmp", name)),
    }
}

/// Write `bytes` to `path` via a temporary sibling and an atomic rename.
///
/// On failure the temporary file is removed and the destination is left
/// untouched (either absent or holding its previous content).
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = staging_path(path);
    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
