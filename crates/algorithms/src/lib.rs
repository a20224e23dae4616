//! # variokit Algorithms
//!
//! Geostatistical algorithms for variokit:
//!
//! - **grid**: prediction-grid construction from a study-area boundary
//! - **variogram**: empirical variograms (Matheron, pairwise-relative,
//!   Cressie estimators), model fitting, model selection
//! - **kriging**: Ordinary Kriging with per-cell variance
//! - **idw**: Inverse Distance Weighting
//! - **crossval**: k-fold cross-validation of a kriging model
//! - **export**: surface tables and GeoTIFF rasters
//! - **pipeline**: the sequential analysis pipeline tying it all together

pub mod crossval;
pub mod export;
pub mod grid;
pub mod idw;
pub mod kriging;
mod linalg;
pub mod pipeline;
pub mod variogram;

use variokit_core::{PointSet, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crossval::{kfold_cross_validation, CrossValParams, CvRecord, CvSummary};
    pub use crate::grid::{build_grid, GridParams, PredictionGrid};
    pub use crate::idw::{idw, IdwParams};
    pub use crate::kriging::{ordinary_kriging, KrigingParams, KrigingSurface};
    pub use crate::pipeline::{run_pipeline, PipelineConfig, PipelineReport};
    pub use crate::variogram::{
        empirical_variogram, estimate_and_fit_all, fit_variogram, select_model,
        EmpiricalVariogram, Estimator, FitInit, FittedVariogram, VariogramModel, VariogramParams,
    };
    pub use crate::{sample_points, SamplePoint};
    pub use variokit_core::prelude::*;
}

/// A sample point with x, y coordinates and a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Squared Euclidean distance to another point
    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn dist(&self, other_x: f64, other_y: f64) -> f64 {
        self.dist_sq(other_x, other_y).sqrt()
    }
}

/// Extract sample points from a point set and a named target column.
///
/// # Errors
/// [`variokit_core::Error::Schema`] if the target column does not exist —
/// raised here, before any interpolation is attempted.
pub fn sample_points(points: &PointSet, target: &str) -> Result<Vec<SamplePoint>> {
    let values = points.column(target)?;
    Ok(points
        .xs()
        .iter()
        .zip(points.ys().iter())
        .zip(values.iter())
        .map(|((&x, &y), &value)| SamplePoint::new(x, y, value))
        .collect())
}
