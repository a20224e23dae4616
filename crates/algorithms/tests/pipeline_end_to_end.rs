//! End-to-end pipeline scenarios on synthetic inputs

use std::fs;
use std::path::Path;

use geo::{polygon, MultiPolygon};
use variokit_algorithms::pipeline::{run_pipeline, PipelineConfig};
use variokit_algorithms::variogram::Estimator;
use variokit_core::io::{read_geotiff, write_polygon_shapefile};
use variokit_core::{Boundary, Error, Raster};

struct Lcg(u64);

impl Lcg {
    fn next_unit(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as f64 / (1u64 << 31) as f64
    }
}

fn write_square_boundary(path: &Path, side: f64) {
    let poly = polygon![
        (x: 0.0, y: 0.0),
        (x: side, y: 0.0),
        (x: side, y: side),
        (x: 0.0, y: side),
    ];
    let boundary = Boundary::new(MultiPolygon(vec![poly]), None);
    write_polygon_shapefile(path, &boundary).unwrap();
}

fn write_points<F>(path: &Path, n: usize, seed: u64, value: F)
where
    F: Fn(f64, f64) -> f64,
{
    let mut rng = Lcg(seed);
    let mut text = String::from("X Y layer5\n");
    for _ in 0..n {
        let x = 0.5 + rng.next_unit() * 9.0;
        let y = 0.5 + rng.next_unit() * 9.0;
        text.push_str(&format!("{} {} {}\n", x, y, value(x, y)));
    }
    fs::write(path, text).unwrap();
}

#[test]
fn constant_field_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let output = dir.path().join("results");
    fs::create_dir_all(&input).unwrap();

    write_square_boundary(&input.join("area.shp"), 10.0);
    write_points(&input.join("samples.txt"), 20, 17, |_, _| 7.5);

    let config = PipelineConfig::from_input_dir(&input, &output).unwrap();
    let report = run_pipeline(&config).unwrap();

    assert_eq!(report.n_points, 20);
    assert_eq!(report.grid_rows, 10);
    assert_eq!(report.grid_cols, 10);

    // A constant field cross-validates with no error
    assert!(report.cv.rmse.abs() < 1e-6, "rmse {}", report.cv.rmse);
    assert!(report.cv.me.abs() < 1e-6, "me {}", report.cv.me);
    assert_eq!(report.cv.n, 20);

    for path in &report.outputs {
        assert!(path.exists(), "missing output {}", path.display());
    }

    // Both surfaces reproduce the constant everywhere (float32 storage)
    for name in ["layer5_krig.tif", "layer5_idw.tif"] {
        let raster: Raster<f64> = read_geotiff(output.join(name)).unwrap();
        assert_eq!(raster.shape(), (10, 10));
        for row in 0..10 {
            for col in 0..10 {
                let v = raster.get(row, col).unwrap();
                assert!(
                    (v - 7.5).abs() < 1e-3,
                    "{}: expected 7.5 at ({},{}), got {}",
                    name,
                    row,
                    col,
                    v
                );
            }
        }
    }

    // One table row per grid cell plus the header
    let kriged = fs::read_to_string(output.join("kriged_layer5.txt")).unwrap();
    assert_eq!(kriged.lines().count(), 101);
    assert!(kriged.starts_with("x\ty\tprediction\tvariance\n"));
    let idw = fs::read_to_string(output.join("idw_layer5.txt")).unwrap();
    assert_eq!(idw.lines().count(), 101);
}

#[test]
fn trend_field_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let output = dir.path().join("results");
    fs::create_dir_all(&input).unwrap();

    write_square_boundary(&input.join("area.shp"), 10.0);
    write_points(&input.join("samples.txt"), 40, 3, |x, y| {
        20.0 + 0.8 * x + 0.5 * y
    });

    let config = PipelineConfig::from_input_dir(&input, &output).unwrap();
    let report = run_pipeline(&config).unwrap();

    assert_eq!(report.chosen.estimator, Estimator::Cressie);
    assert!(report.cv.rmse.is_finite());
    assert!(report.cv.rmse < 3.0, "rmse {}", report.cv.rmse);

    // IDW stays within the observed value range (convexity)
    let idw: Raster<f64> = read_geotiff(output.join("layer5_idw.tif")).unwrap();
    let stats = idw.statistics();
    let lo = 20.0 + 0.8 * 0.5 + 0.5 * 0.5;
    let hi = 20.0 + 0.8 * 9.5 + 0.5 * 9.5;
    assert!(stats.min.unwrap() >= lo - 1e-3, "min {:?}", stats.min);
    assert!(stats.max.unwrap() <= hi + 1e-3, "max {:?}", stats.max);
}

#[test]
fn missing_target_column_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let output = dir.path().join("results");
    fs::create_dir_all(&input).unwrap();

    write_square_boundary(&input.join("area.shp"), 10.0);
    write_points(&input.join("samples.txt"), 20, 17, |_, _| 7.5);

    let mut config = PipelineConfig::from_input_dir(&input, &output).unwrap();
    config.target = "layer9".to_string();

    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(err, Error::Schema(_)), "got {err:?}");
    assert!(!output.exists(), "failed run must not create outputs");
}

#[test]
fn degenerate_points_raise_variogram_fit_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let output = dir.path().join("results");
    fs::create_dir_all(&input).unwrap();

    write_square_boundary(&input.join("area.shp"), 10.0);
    // Three rows but only two distinct locations
    fs::write(
        input.join("samples.txt"),
        "X Y layer5\n2 2 4.0\n2 2 4.5\n8 8 9.0\n",
    )
    .unwrap();

    let config = PipelineConfig::from_input_dir(&input, &output).unwrap();
    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(err, Error::VariogramFit(_)), "got {err:?}");
    assert!(!output.exists());
}

#[test]
fn missing_input_directory_entries() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    fs::create_dir_all(&input).unwrap();
    write_square_boundary(&input.join("area.shp"), 10.0);

    let err = PipelineConfig::from_input_dir(&input, dir.path().join("results")).unwrap_err();
    assert!(matches!(err, Error::MissingInput { .. }), "got {err:?}");
}
