//! Inverse Distance Weighting (IDW) interpolation
//!
//! Estimates values at grid locations as a weighted average of sample
//! points, with weights inversely proportional to distance raised to a
//! power parameter. Model-free: unlike kriging it needs no variogram.
//! Because the weights are a convex combination, every prediction lies
//! between the minimum and maximum observed values.
//!
//! Reference:
//! Shepard, D. (1968). A two-dimensional interpolation function for
//! irregularly-spaced data. ACM National Conference.

use rayon::prelude::*;
use variokit_core::{Error, Raster, Result};

use crate::grid::PredictionGrid;
use crate::SamplePoint;

/// Parameters for IDW interpolation
#[derive(Debug, Clone)]
pub struct IdwParams {
    /// Power parameter (default: 2.0, inverse squared distance).
    /// Higher values give more weight to nearby points.
    pub power: f64,
    /// Maximum search radius. Points beyond this distance are ignored.
    /// `None` means all points are used (global IDW).
    pub max_radius: Option<f64>,
    /// Maximum number of nearest points to use.
    /// `None` means use all points within radius.
    pub max_points: Option<usize>,
    /// Minimum distance threshold. If a sample point is closer than this
    /// to the target cell, its value is used directly (avoids singularity).
    pub snap_distance: f64,
}

impl Default for IdwParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            max_radius: None,
            max_points: None,
            snap_distance: 1e-10,
        }
    }
}

/// Perform IDW interpolation from scattered points onto a prediction grid.
///
/// # Algorithm
///
/// For each grid cell at position (x, y):
///
/// ```text
/// z(x,y) = Σ(wi * zi) / Σ(wi)
/// where wi = 1 / d(x,y, xi,yi)^p
/// ```
///
/// # Returns
/// Raster with interpolated values. Cells with no points within radius are NaN.
///
/// # Errors
/// [`Error::Algorithm`] when no sample points are provided.
pub fn idw(
    points: &[SamplePoint],
    grid: &PredictionGrid,
    params: &IdwParams,
) -> Result<Raster<f64>> {
    if points.is_empty() {
        return Err(Error::Algorithm("No sample points provided".into()));
    }

    let rows = grid.rows();
    let cols = grid.cols();
    let cells = grid.cells();
    let power = params.power;
    let snap = params.snap_distance;
    let max_radius_sq = params.max_radius.map(|r| r * r);

    let use_max_points = params.max_points.is_some();
    let max_points = params.max_points.unwrap_or(points.len());

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for col in 0..cols {
                let cell = &cells[row * cols + col];
                let (cx, cy) = (cell.x, cell.y);

                // Collect distances and values
                let mut candidates: Vec<(f64, f64)> = Vec::new();
                let mut snapped = None;

                for pt in points {
                    let dsq = pt.dist_sq(cx, cy);

                    if dsq < snap * snap {
                        snapped = Some(pt.value);
                        break;
                    }

                    if let Some(max_sq) = max_radius_sq {
                        if dsq > max_sq {
                            continue;
                        }
                    }

                    candidates.push((dsq, pt.value));
                }

                if let Some(val) = snapped {
                    row_data[col] = val;
                    continue;
                }

                if candidates.is_empty() {
                    continue; // NaN
                }

                if use_max_points && candidates.len() > max_points {
                    candidates
                        .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
                    candidates.truncate(max_points);
                }

                // Weighted average
                let mut sum_w = 0.0;
                let mut sum_wz = 0.0;

                for &(dsq, val) in &candidates {
                    let d = dsq.sqrt();
                    let w = 1.0 / d.powf(power);
                    sum_w += w;
                    sum_wz += w * val;
                }

                if sum_w > 0.0 {
                    row_data[col] = sum_wz / sum_w;
                }
            }

            row_data
        })
        .collect();

    let mut output = Raster::from_vec(data, rows, cols)?;
    output.set_transform(*grid.transform());
    output.set_crs(grid.crs().cloned());
    output.set_nodata(Some(f64::NAN));

    Ok(output)
}
