//! Input-directory discovery
//!
//! The pipeline takes an input directory holding one vector boundary and
//! one tabular point file. When several files match a pattern the
//! lexicographically first is taken, so discovery is deterministic.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The two input files a pipeline run needs.
#[derive(Debug, Clone)]
pub struct DiscoveredInputs {
    /// Boundary shapefile (`*.shp`)
    pub boundary: PathBuf,
    /// Point table (`*.txt` or `*.csv`)
    pub points: PathBuf,
}

/// Locate the boundary shapefile and the point table in `dir`.
///
/// # Errors
/// [`Error::MissingInput`] if either file is absent. Absence of required
/// input is a fatal configuration error for the run; there is no retry.
pub fn discover_inputs(dir: &Path) -> Result<DiscoveredInputs> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    let boundary = entries
        .iter()
        .find(|p| has_extension(p, &["shp"]))
        .cloned()
        .ok_or(Error::MissingInput {
            kind: "boundary",
            pattern: "*.shp",
            dir: dir.to_path_buf(),
        })?;

    let points = entries
        .iter()
        .find(|p| has_extension(p, &["txt", "csv"]))
        .cloned()
        .ok_or(Error::MissingInput {
            kind: "point table",
            pattern: "*.txt|*.csv",
            dir: dir.to_path_buf(),
        })?;

    Ok(DiscoveredInputs { boundary, points })
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            extensions.iter().any(|want| e == *want)
        })
        .unwrap_or(false)
}
