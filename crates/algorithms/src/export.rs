//! Surface export: tab-delimited tables and GeoTIFF rasters
//!
//! Tables carry one row per grid cell (x, y, prediction, and for kriging
//! the prediction variance). Rasters are single-band float GeoTIFFs
//! aligned to the prediction grid. Both writers overwrite existing files
//! and stage through a temporary path, so a failed export leaves no
//! partial file behind.

use std::path::Path;

use variokit_core::io::{write_geotiff, write_table};
use variokit_core::{Error, Raster, Result};

use crate::grid::PredictionGrid;

/// Write a prediction surface as a tab-delimited table.
///
/// Columns: `x`, `y`, `prediction`, and `variance` when provided. Rows
/// follow the grid's row-major cell order. Cells without a prediction
/// (outside a search radius) are written as `NA`.
pub fn write_surface_table(
    path: &Path,
    grid: &PredictionGrid,
    estimate: &Raster<f64>,
    variance: Option<&Raster<f64>>,
) -> Result<()> {
    check_alignment(grid, estimate)?;
    if let Some(variance) = variance {
        check_alignment(grid, variance)?;
    }

    let headers: &[&str] = if variance.is_some() {
        &["x", "y", "prediction", "variance"]
    } else {
        &["x", "y", "prediction"]
    };

    let rows = grid.cells().iter().map(|cell| {
        // Alignment was checked above; cells index within bounds
        let est = estimate
            .get(cell.row, cell.col)
            .unwrap_or(f64::NAN);
        match variance {
            Some(var) => vec![
                cell.x,
                cell.y,
                est,
                var.get(cell.row, cell.col).unwrap_or(f64::NAN),
            ],
            None => vec![cell.x, cell.y, est],
        }
    });

    write_table(path, headers, rows)
}

/// Write a prediction surface as a single-band float GeoTIFF aligned to
/// the prediction grid.
pub fn write_surface_raster(path: &Path, grid: &PredictionGrid, raster: &Raster<f64>) -> Result<()> {
    check_alignment(grid, raster)?;
    write_geotiff(raster, path)
}

fn check_alignment(grid: &PredictionGrid, raster: &Raster<f64>) -> Result<()> {
    if raster.rows() != grid.rows() || raster.cols() != grid.cols() {
        return Err(Error::Algorithm(format!(
            "surface {}x{} does not match grid {}x{}",
            raster.rows(),
            raster.cols(),
            grid.rows(),
            grid.cols()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{build_grid, GridParams};
    use crate::idw::{idw, IdwParams};
    use crate::SamplePoint;
    use geo::{polygon, MultiPolygon};
    use std::fs;
    use variokit_core::io::read_geotiff;
    use variokit_core::Boundary;

    fn square_grid(side: f64) -> PredictionGrid {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: side, y: 0.0),
            (x: side, y: side),
            (x: 0.0, y: side),
        ];
        let boundary = Boundary::new(MultiPolygon(vec![poly]), None);
        build_grid(&boundary, &GridParams::default()).unwrap()
    }

    fn surface(grid: &PredictionGrid) -> Raster<f64> {
        let points = vec![
            SamplePoint::new(2.0, 2.0, 5.0),
            SamplePoint::new(8.0, 8.0, 15.0),
        ];
        idw(&points, grid, &IdwParams::default()).unwrap()
    }

    #[test]
    fn test_table_row_per_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idw_layer5.txt");
        let grid = square_grid(10.0);
        let est = surface(&grid);

        write_surface_table(&path, &grid, &est, None).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), grid.len() + 1);
        assert_eq!(lines[0], "x\ty\tprediction");
    }

    #[test]
    fn test_table_with_variance_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kriged_layer5.txt");
        let grid = square_grid(10.0);
        let est = surface(&grid);
        let var = surface(&grid);

        write_surface_table(&path, &grid, &est, Some(&var)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("x\ty\tprediction\tvariance\n"));
    }

    #[test]
    fn test_raster_roundtrip_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer5_idw.tif");
        let grid = square_grid(10.0);
        let est = surface(&grid);

        write_surface_raster(&path, &grid, &est).unwrap();

        let read_back: Raster<f64> = read_geotiff(&path).unwrap();
        assert_eq!(read_back.shape(), (grid.rows(), grid.cols()));
        let gt = read_back.transform();
        assert!((gt.origin_x - grid.transform().origin_x).abs() < 1e-9);
        assert!((gt.origin_y - grid.transform().origin_y).abs() < 1e-9);
    }

    #[test]
    fn test_misaligned_surface_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        let grid = square_grid(10.0);
        let wrong = Raster::<f64>::new(3, 3);

        assert!(write_surface_table(&path, &grid, &wrong, None).is_err());
        assert!(!path.exists());
    }
}
