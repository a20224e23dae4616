//! The sequential analysis pipeline
//!
//! Five ordered stages, each feeding the next: load inputs, build the
//! prediction grid, estimate and fit variogram models, interpolate
//! (kriging and IDW), cross-validate and export. Strictly sequential; a
//! failure at any stage aborts the run, and because validation runs
//! before export a failed run writes no output files at all.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use variokit_core::io::{discover_inputs, read_point_table, read_polygon_shapefile, TableOptions};
use variokit_core::Result;

use crate::crossval::{kfold_cross_validation, CrossValParams, CvSummary};
use crate::export::{write_surface_raster, write_surface_table};
use crate::grid::{build_grid, GridParams};
use crate::idw::{idw, IdwParams};
use crate::kriging::{ordinary_kriging, KrigingParams};
use crate::variogram::{
    estimate_and_fit_all, sample_variance, select_model, ChosenModel, Estimator, FitInit,
    VariogramParams, DEFAULT_PREFERENCE,
};
use crate::{sample_points, SamplePoint};

/// Full configuration of a pipeline run.
///
/// Everything the original workflow hard-coded is an explicit field:
/// target column, cell size, variogram initial values, fold count, IDW
/// power, and the cross-validation seed.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Boundary shapefile path
    pub boundary_path: PathBuf,
    /// Point table path
    pub points_path: PathBuf,
    /// Results directory; created if missing
    pub output_dir: PathBuf,
    /// Target attribute column (default `layer5`)
    pub target: String,
    /// Prediction-grid cell size in spatial units
    pub cell_size: f64,
    /// Point-table parsing options
    pub table: TableOptions,
    /// Empirical-variogram binning
    pub variogram: VariogramParams,
    /// Model-fit initial values; a `None` sill is seeded with the sample
    /// variance of the target variable
    pub fit: FitInit,
    /// Model-selection preference order
    pub preference: Vec<Estimator>,
    /// Kriging neighbor search
    pub kriging: KrigingParams,
    /// IDW parameters
    pub idw: IdwParams,
    /// Cross-validation fold count
    pub folds: usize,
    /// Cross-validation shuffle seed
    pub seed: u64,
}

impl PipelineConfig {
    /// Configuration with default parameters for explicit input paths.
    pub fn new(
        boundary_path: impl Into<PathBuf>,
        points_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            boundary_path: boundary_path.into(),
            points_path: points_path.into(),
            output_dir: output_dir.into(),
            target: "layer5".to_string(),
            cell_size: 1.0,
            table: TableOptions::default(),
            variogram: VariogramParams::default(),
            fit: FitInit::default(),
            preference: DEFAULT_PREFERENCE.to_vec(),
            kriging: KrigingParams::default(),
            idw: IdwParams::default(),
            folds: 5,
            seed: 42,
        }
    }

    /// Discover the boundary and point table in an input directory.
    ///
    /// # Errors
    /// [`variokit_core::Error::MissingInput`] when either file is absent.
    pub fn from_input_dir(input_dir: &Path, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let inputs = discover_inputs(input_dir)?;
        Ok(Self::new(inputs.boundary, inputs.points, output_dir))
    }
}

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Number of observations loaded
    pub n_points: usize,
    /// Prediction-grid dimensions
    pub grid_rows: usize,
    pub grid_cols: usize,
    /// The model chosen for kriging and cross-validation
    pub chosen: ChosenModel,
    /// Cross-validation summary (RMSE, ME)
    pub cv: CvSummary,
    /// Paths of every written output file
    pub outputs: Vec<PathBuf>,
}

/// Run the full pipeline: load → grid → variograms → interpolate →
/// cross-validate → export.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport> {
    // Stage 1: load inputs
    info!(boundary = %config.boundary_path.display(), "reading boundary");
    let boundary = read_polygon_shapefile(&config.boundary_path)?;

    info!(points = %config.points_path.display(), "reading point table");
    let mut point_set = read_point_table(&config.points_path, &config.table)?;
    point_set.align_crs(&boundary)?;

    let samples: Vec<SamplePoint> = sample_points(&point_set, &config.target)?;
    info!(
        n = samples.len(),
        target = %config.target,
        "loaded observations"
    );

    // Stage 2: prediction grid
    let grid = build_grid(
        &boundary,
        &GridParams {
            cell_size: config.cell_size,
        },
    )?;
    info!(rows = grid.rows(), cols = grid.cols(), "built prediction grid");

    // Stage 3: variogram estimation, fitting, selection
    let values: Vec<f64> = samples.iter().map(|p| p.value).collect();
    let mut fit = config.fit.clone();
    if fit.sill.is_none() {
        fit.sill = Some(sample_variance(&values));
    }

    let candidates = estimate_and_fit_all(&samples, &config.variogram, &fit)?;
    for candidate in &candidates {
        match (&candidate.fitted, &candidate.failure) {
            (Some(fitted), _) => debug!(
                estimator = %candidate.estimator,
                nugget = fitted.nugget,
                sill = fitted.sill,
                range = fitted.range,
                "fitted variogram"
            ),
            (None, Some(reason)) => debug!(
                estimator = %candidate.estimator,
                reason = %reason,
                "variogram fit failed"
            ),
            _ => {}
        }
    }

    let chosen = select_model(&candidates, &config.preference)?;
    info!(
        estimator = %chosen.estimator,
        model = %chosen.fitted.model,
        nugget = chosen.fitted.nugget,
        sill = chosen.fitted.sill,
        range = chosen.fitted.range,
        "selected variogram model"
    );

    // Stage 4: interpolation
    let kriged = ordinary_kriging(&samples, &chosen.fitted, &grid, &config.kriging)?;
    info!("kriging surface complete");

    let idw_surface = idw(&samples, &grid, &config.idw)?;
    info!("idw surface complete");

    // Stage 5a: cross-validation (before export, so a validation failure
    // leaves no output files)
    let records = kfold_cross_validation(
        &samples,
        &chosen.fitted,
        &CrossValParams {
            folds: config.folds,
            seed: config.seed,
            kriging: config.kriging.clone(),
        },
    )?;
    let cv = CvSummary::from_records(&records);
    info!(rmse = cv.rmse, me = cv.me, n = cv.n, "cross-validation complete");

    // Stage 5b: export
    fs::create_dir_all(&config.output_dir)?;

    let kriged_table = config.output_dir.join(format!("kriged_{}.txt", config.target));
    let idw_table = config.output_dir.join(format!("idw_{}.txt", config.target));
    let kriged_raster = config.output_dir.join(format!("{}_krig.tif", config.target));
    let idw_raster = config.output_dir.join(format!("{}_idw.tif", config.target));

    write_surface_table(&kriged_table, &grid, &kriged.estimate, Some(&kriged.variance))?;
    write_surface_table(&idw_table, &grid, &idw_surface, None)?;
    write_surface_raster(&kriged_raster, &grid, &kriged.estimate)?;
    write_surface_raster(&idw_raster, &grid, &idw_surface)?;

    let outputs = vec![kriged_table, idw_table, kriged_raster, idw_raster];
    info!(files = outputs.len(), dir = %config.output_dir.display(), "exported outputs");

    Ok(PipelineReport {
        n_points: samples.len(),
        grid_rows: grid.rows(),
        grid_cols: grid.cols(),
        chosen,
        cv,
        outputs,
    })
}
