//! Ordinary Kriging interpolation
//!
//! Best Linear Unbiased Estimator (BLUE) for spatial data. Uses a fitted
//! variogram model to compute optimal interpolation weights that minimize
//! estimation variance while satisfying an unbiasedness constraint.
//!
//! The kriging system for k neighbor points:
//! ```text
//! [γ(x₁,x₁) ... γ(x₁,xₖ) 1] [w₁]   [γ(x₁,x₀)]
//! [   ...     ...    ...    .]  [. ] = [   ...    ]
//! [γ(xₖ,x₁) ... γ(xₖ,xₖ) 1] [wₖ]   [γ(xₖ,x₀)]
//! [  1       ...    1       0] [μ ]   [    1     ]
//! ```
//! where γ is the semivariance from the fitted variogram, x₀ is the
//! target location, and μ is the Lagrange multiplier ensuring Σwᵢ = 1.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use rayon::prelude::*;
use variokit_core::{Error, Raster, Result};

use crate::grid::PredictionGrid;
use crate::linalg;
use crate::variogram::FittedVariogram;
use crate::SamplePoint;

/// Parameters for Ordinary Kriging interpolation
#[derive(Debug, Clone)]
pub struct KrigingParams {
    /// Maximum number of nearest points to use per estimation.
    /// `None` means all points (global kriging, the default).
    pub max_points: Option<usize>,
    /// Maximum search radius. Points beyond this are ignored.
    /// `None` means use global search.
    pub max_radius: Option<f64>,
}

impl Default for KrigingParams {
    fn default() -> Self {
        Self {
            max_points: None,
            max_radius: None,
        }
    }
}

/// Result of Ordinary Kriging interpolation over a prediction grid
#[derive(Debug, Clone)]
pub struct KrigingSurface {
    /// Interpolated values
    pub estimate: Raster<f64>,
    /// Kriging variance (estimation uncertainty); NaN where the system
    /// was singular and the estimate fell back to an inverse-distance
    /// average
    pub variance: Raster<f64>,
}

/// Perform Ordinary Kriging from scattered points onto a prediction grid.
///
/// # Arguments
/// * `points` — Sample points with (x, y, value)
/// * `variogram` — Fitted variogram model (see [`crate::variogram`])
/// * `grid` — Prediction grid from [`crate::grid::build_grid`]
/// * `params` — Neighbor search parameters
///
/// # Returns
/// [`KrigingSurface`] with the estimate and its kriging variance,
/// full-coverage over the grid (NaN only where a search radius excludes
/// every sample point).
///
/// # Errors
/// [`Error::Algorithm`] with fewer than 2 sample points.
pub fn ordinary_kriging(
    points: &[SamplePoint],
    variogram: &FittedVariogram,
    grid: &PredictionGrid,
    params: &KrigingParams,
) -> Result<KrigingSurface> {
    if points.len() < 2 {
        return Err(Error::Algorithm(
            "Kriging requires at least 2 sample points".into(),
        ));
    }

    let cols = grid.cols();
    let rows = grid.rows();
    let cells = grid.cells();

    let output: Vec<(f64, f64)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![(f64::NAN, f64::NAN); cols];
            for col in 0..cols {
                let cell = &cells[row * cols + col];
                row_data[col] = krige_at(points, variogram, cell.x, cell.y, params);
            }
            row_data
        })
        .collect();

    let est_data: Vec<f64> = output.iter().map(|&(e, _)| e).collect();
    let var_data: Vec<f64> = output.iter().map(|&(_, v)| v).collect();

    let mut estimate = Raster::from_vec(est_data, rows, cols)?;
    estimate.set_transform(*grid.transform());
    estimate.set_crs(grid.crs().cloned());
    estimate.set_nodata(Some(f64::NAN));

    let mut variance = Raster::from_vec(var_data, rows, cols)?;
    variance.set_transform(*grid.transform());
    variance.set_crs(grid.crs().cloned());
    variance.set_nodata(Some(f64::NAN));

    Ok(KrigingSurface { estimate, variance })
}

/// Kriging prediction at a single location.
///
/// Returns `(estimate, variance)`. Shared by the surface pass and by
/// cross-validation, so held-out points are predicted by exactly the
/// same kernel that fills the grid. Returns `(NaN, NaN)` when the search
/// radius excludes every sample point; falls back to an inverse-distance
/// average with NaN variance when the kriging system is singular.
pub fn krige_at(
    points: &[SamplePoint],
    variogram: &FittedVariogram,
    x0: f64,
    y0: f64,
    params: &KrigingParams,
) -> (f64, f64) {
    let n = points.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }

    let mut dists: Vec<(usize, f64)> = points
        .iter()
        .enumerate()
        .map(|(i, pt)| (i, pt.dist(x0, y0)))
        .collect();

    if let Some(max_r) = params.max_radius {
        dists.retain(|&(_, d)| d <= max_r);
    }
    if dists.is_empty() {
        return (f64::NAN, f64::NAN);
    }

    // Sort by distance, take the nearest k
    dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let k = params.max_points.unwrap_or(dists.len()).min(dists.len());
    let neighbors = &dists[..k];

    // Target coincident with a sample point: exact by construction
    if neighbors[0].1 < 1e-12 {
        return (points[neighbors[0].0].value, 0.0);
    }

    // Build kriging system (k+1) × (k+1)
    let m = k + 1;
    let mut mat = vec![0.0_f64; m * m];
    let mut rhs = vec![0.0_f64; m];

    for i in 0..k {
        let pi = &points[neighbors[i].0];
        for j in 0..k {
            if i == j {
                mat[i * m + j] = 0.0; // γ(0) = 0 by convention
            } else {
                let pj = &points[neighbors[j].0];
                mat[i * m + j] = variogram.evaluate(pi.dist(pj.x, pj.y));
            }
        }
        // Lagrange constraint column and row
        mat[i * m + k] = 1.0;
        mat[k * m + i] = 1.0;
    }

    for i in 0..k {
        rhs[i] = variogram.evaluate(neighbors[i].1);
    }
    rhs[k] = 1.0;

    match linalg::solve(m, &mut mat, &mut rhs) {
        Ok(solution) => {
            // Estimate: z₀ = Σ wᵢ · zᵢ
            let mut estimate = 0.0;
            for i in 0..k {
                estimate += solution[i] * points[neighbors[i].0].value;
            }

            // Kriging variance: σ² = Σ wᵢ·γ(xᵢ,x₀) + μ
            let mut variance = solution[k]; // Lagrange multiplier μ
            for i in 0..k {
                variance += solution[i] * variogram.evaluate(neighbors[i].1);
            }

            (estimate, variance.max(0.0))
        }
        Err(_) => {
            // Singular system: inverse-distance average keeps coverage
            let mut sum_w = 0.0;
            let mut sum_wz = 0.0;
            for &(idx, dist) in neighbors {
                let w = 1.0 / (dist * dist);
                sum_w += w;
                sum_wz += w * points[idx].value;
            }
            if sum_w > 0.0 {
                (sum_wz / sum_w, f64::NAN)
            } else {
                (f64::NAN, f64::NAN)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{build_grid, GridParams};
    use crate::variogram::VariogramModel;
    use geo::{polygon, MultiPolygon};
    use variokit_core::Boundary;

    fn square_grid(side: f64, cell: f64) -> PredictionGrid {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: side, y: 0.0),
            (x: side, y: side),
            (x: 0.0, y: side),
        ];
        let boundary = Boundary::new(MultiPolygon(vec![poly]), None);
        build_grid(&boundary, &GridParams { cell_size: cell }).unwrap()
    }

    fn spherical(nugget: f64, sill: f64, range: f64) -> FittedVariogram {
        FittedVariogram {
            model: VariogramModel::Spherical,
            nugget,
            sill,
            range,
            partial_sill: sill - nugget,
            rss: 0.0,
            converged: true,
        }
    }

    fn corner_points() -> Vec<SamplePoint> {
        vec![
            SamplePoint::new(1.0, 1.0, 10.0),
            SamplePoint::new(9.0, 1.0, 20.0),
            SamplePoint::new(1.0, 9.0, 30.0),
            SamplePoint::new(9.0, 9.0, 40.0),
            SamplePoint::new(5.0, 5.0, 25.0),
        ]
    }

    #[test]
    fn test_ok_full_coverage() {
        let grid = square_grid(10.0, 1.0);
        let variogram = spherical(0.0, 100.0, 8.0);
        let surface =
            ordinary_kriging(&corner_points(), &variogram, &grid, &KrigingParams::default())
                .unwrap();

        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                let v = surface.estimate.get(row, col).unwrap();
                assert!(!v.is_nan(), "NaN at ({}, {})", row, col);
            }
        }
    }

    #[test]
    fn test_ok_exact_at_sample_point() {
        let variogram = spherical(0.0, 100.0, 8.0);
        let (est, var) = krige_at(&corner_points(), &variogram, 5.0, 5.0, &KrigingParams::default());
        assert!((est - 25.0).abs() < 1e-9, "est {}", est);
        assert!(var.abs() < 1e-9, "var {}", var);
    }

    #[test]
    fn test_ok_exactness_as_nugget_vanishes() {
        // Prediction just off an observed point approaches the observed
        // value as the nugget goes to zero
        let points = corner_points();
        let (x, y) = (5.0 + 1e-6, 5.0);
        let observed = 25.0;

        let mut errors = Vec::new();
        for nugget in [20.0, 2.0, 0.02, 0.0] {
            let variogram = spherical(nugget, 100.0, 8.0);
            let (est, _) = krige_at(&points, &variogram, x, y, &KrigingParams::default());
            errors.push((est - observed).abs());
        }

        for pair in errors.windows(2) {
            assert!(
                pair[1] <= pair[0] + 1e-9,
                "error should shrink with the nugget: {:?}",
                errors
            );
        }
        assert!(errors.last().unwrap() < &1e-4, "errors {:?}", errors);
    }

    #[test]
    fn test_ok_variance_nonnegative_and_grows_with_distance() {
        let points = vec![
            SamplePoint::new(1.0, 1.0, 10.0),
            SamplePoint::new(2.0, 1.0, 12.0),
            SamplePoint::new(1.0, 2.0, 14.0),
        ];
        let variogram = spherical(1.0, 10.0, 5.0);

        let (_, var_near) = krige_at(&points, &variogram, 1.5, 1.5, &KrigingParams::default());
        let (_, var_far) = krige_at(&points, &variogram, 9.0, 9.0, &KrigingParams::default());

        assert!(var_near >= 0.0);
        assert!(var_far >= 0.0);
        assert!(
            var_far > var_near,
            "variance should grow with distance: near {} far {}",
            var_near,
            var_far
        );
    }

    #[test]
    fn test_ok_with_search_radius() {
        let grid = square_grid(10.0, 1.0);
        let points = vec![
            SamplePoint::new(1.0, 1.0, 10.0),
            SamplePoint::new(2.0, 1.0, 20.0),
            SamplePoint::new(1.0, 2.0, 30.0),
        ];
        let variogram = spherical(0.0, 100.0, 2.0);
        let params = KrigingParams {
            max_radius: Some(2.0),
            ..Default::default()
        };

        let surface = ordinary_kriging(&points, &variogram, &grid, &params).unwrap();

        // Far corner is beyond the radius of every point
        let far = surface.estimate.get(0, 9).unwrap();
        assert!(far.is_nan(), "far cell should be NaN, got {}", far);
        // Near the cluster there is coverage
        let near = surface.estimate.get(9, 0).unwrap();
        assert!(!near.is_nan());
    }

    #[test]
    fn test_ok_max_points_limits_neighbors() {
        let points = corner_points();
        let variogram = spherical(0.0, 100.0, 8.0);
        let params = KrigingParams {
            max_points: Some(2),
            ..Default::default()
        };

        let (est, _) = krige_at(&points, &variogram, 4.9, 5.1, &KrigingParams::default());
        let (est_limited, _) = krige_at(&points, &variogram, 4.9, 5.1, &params);
        assert!(!est.is_nan() && !est_limited.is_nan());
        // Both are sane interpolations of the observed values
        assert!(est_limited >= 10.0 && est_limited <= 40.0);
    }

    #[test]
    fn test_ok_constant_field_reproduced() {
        // A zero variogram makes the system singular; the fallback keeps
        // the constant
        let grid = square_grid(10.0, 1.0);
        let points: Vec<SamplePoint> = (0..12)
            .map(|i| SamplePoint::new(1.0 + (i % 4) as f64 * 2.5, 1.0 + (i / 4) as f64 * 3.0, 42.0))
            .collect();
        let variogram = spherical(0.0, 0.0, 400.0);

        let surface =
            ordinary_kriging(&points, &variogram, &grid, &KrigingParams::default()).unwrap();

        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                let v = surface.estimate.get(row, col).unwrap();
                assert!(
                    (v - 42.0).abs() < 1e-9,
                    "constant field should krige to 42, got {} at ({},{})",
                    v,
                    row,
                    col
                );
            }
        }
    }

    #[test]
    fn test_ok_too_few_points() {
        let grid = square_grid(10.0, 1.0);
        let points = vec![SamplePoint::new(0.0, 0.0, 10.0)];
        let variogram = spherical(0.0, 10.0, 50.0);
        assert!(ordinary_kriging(&points, &variogram, &grid, &KrigingParams::default()).is_err());
    }
}
