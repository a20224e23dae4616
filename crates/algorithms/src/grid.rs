//! Prediction-grid construction
//!
//! Samples the study-area boundary on a regular lattice. The lattice
//! covers the boundary's bounding extent at a fixed cell size, with the
//! first sample offset to `(min_x + cell, min_y + cell)` from the extent
//! origin. Construction is deterministic: the same boundary and cell size
//! always produce the identical grid.

use geo::{BoundingRect, Contains, Point};

use variokit_core::{Boundary, Error, GeoTransform, Result, CRS};

/// Parameters for grid construction
#[derive(Debug, Clone)]
pub struct GridParams {
    /// Lattice spacing in spatial units (default 1.0)
    pub cell_size: f64,
}

impl Default for GridParams {
    fn default() -> Self {
        Self { cell_size: 1.0 }
    }
}

/// One lattice cell: its (row, col) index, the sample location at its
/// center, and whether that location falls inside the boundary polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    pub x: f64,
    pub y: f64,
    pub inside: bool,
}

/// A regular lattice of prediction locations over the boundary extent.
///
/// Cells are stored in row-major order, row 0 at the top (largest y), so
/// the grid maps directly onto a north-up raster via its transform.
#[derive(Debug, Clone)]
pub struct PredictionGrid {
    transform: GeoTransform,
    rows: usize,
    cols: usize,
    cells: Vec<GridCell>,
    crs: Option<CRS>,
}

impl PredictionGrid {
    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of lattice cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid holds no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The raster geotransform whose pixel centers are the sample locations
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// The grid CRS, inherited from the boundary
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// All cells in row-major order
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// The cell at (row, col)
    pub fn cell(&self, row: usize, col: usize) -> Option<&GridCell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col)
    }
}

/// Build the prediction grid for a boundary at the given cell size.
///
/// # Errors
/// - [`Error::InvalidParameter`] for a non-positive cell size
/// - [`Error::Algorithm`] when the boundary extent is empty or smaller
///   than a single cell
pub fn build_grid(boundary: &Boundary, params: &GridParams) -> Result<PredictionGrid> {
    let cell = params.cell_size;
    if !cell.is_finite() || cell <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "cell_size",
            value: cell.to_string(),
            reason: "must be a positive number".into(),
        });
    }

    let rect = boundary
        .geometry()
        .bounding_rect()
        .ok_or_else(|| Error::Algorithm("boundary has no extent".into()))?;

    let (min_x, min_y) = (rect.min().x, rect.min().y);
    let (max_x, max_y) = (rect.max().x, rect.max().y);

    // Samples at min + cell, min + 2*cell, ... while they stay within the
    // extent. The epsilon absorbs representation error at exact multiples.
    let cols = ((max_x - min_x) / cell + 1e-9).floor() as usize;
    let rows = ((max_y - min_y) / cell + 1e-9).floor() as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::Algorithm(format!(
            "boundary extent {}x{} is smaller than one cell of size {}",
            max_x - min_x,
            max_y - min_y,
            cell
        )));
    }

    // North-up transform with pixel centers on the sample locations:
    // center of (col 0, row 0) is (min_x + cell, min_y + rows*cell).
    let transform = GeoTransform::new(
        min_x + cell / 2.0,
        min_y + rows as f64 * cell + cell / 2.0,
        cell,
        -cell,
    );

    let geometry = boundary.geometry();
    let mut cells = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let (x, y) = transform.pixel_to_geo(col, row);
            let inside = geometry.contains(&Point::new(x, y));
            cells.push(GridCell {
                row,
                col,
                x,
                y,
                inside,
            });
        }
    }

    Ok(PredictionGrid {
        transform,
        rows,
        cols,
        cells,
        crs: boundary.crs().cloned(),
    })
}
