//! variokit CLI - geostatistical interpolation runs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use variokit_algorithms::pipeline::{run_pipeline, PipelineConfig};
use variokit_algorithms::variogram::{
    estimate_and_fit_all, sample_variance, FitInit, VariogramModel, VariogramParams,
};
use variokit_algorithms::sample_points;
use variokit_core::io::{discover_inputs, read_point_table, TableOptions};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "variokit")]
#[command(author, version, about = "Geostatistical interpolation: variograms, kriging, IDW", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: load, grid, variograms, kriging, IDW,
    /// cross-validation, export
    Run {
        /// Input directory holding one *.shp boundary and one *.txt/*.csv
        /// point table
        #[arg(long, conflicts_with_all = ["boundary", "points"])]
        input_dir: Option<PathBuf>,
        /// Boundary shapefile (alternative to --input-dir)
        #[arg(long, requires = "points")]
        boundary: Option<PathBuf>,
        /// Point table (alternative to --input-dir)
        #[arg(long, requires = "boundary")]
        points: Option<PathBuf>,
        /// Results directory
        #[arg(short, long, default_value = "results")]
        output_dir: PathBuf,
        /// Target attribute column
        #[arg(short, long, default_value = "layer5")]
        target: String,
        /// Prediction-grid cell size in spatial units
        #[arg(long, default_value = "1.0")]
        cell_size: f64,
        /// Cross-validation fold count
        #[arg(long, default_value = "5")]
        folds: usize,
        /// Cross-validation shuffle seed
        #[arg(long, default_value = "42")]
        seed: u64,
        /// IDW power parameter
        #[arg(long, default_value = "2.0")]
        idw_power: f64,
        /// Initial variogram range for fitting
        #[arg(long, default_value = "400.0")]
        range: f64,
        /// Initial variogram nugget for fitting
        #[arg(long, default_value = "0.0")]
        nugget: f64,
        /// Initial variogram sill (defaults to the target's sample variance)
        #[arg(long)]
        sill: Option<f64>,
        /// Variogram model family: spherical, exponential, gaussian
        #[arg(long, default_value = "spherical")]
        model: String,
    },
    /// Estimate and fit variograms, print the diagnostic tables
    Variogram {
        /// Point table
        points: PathBuf,
        /// Target attribute column
        #[arg(short, long, default_value = "layer5")]
        target: String,
        /// Initial variogram range for fitting
        #[arg(long, default_value = "400.0")]
        range: f64,
        /// Initial variogram nugget for fitting
        #[arg(long, default_value = "0.0")]
        nugget: f64,
        /// Initial variogram sill (defaults to the target's sample variance)
        #[arg(long)]
        sill: Option<f64>,
        /// Variogram model family: spherical, exponential, gaussian
        #[arg(long, default_value = "spherical")]
        model: String,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn parse_model(s: &str) -> Result<VariogramModel> {
    match s.to_lowercase().as_str() {
        "spherical" | "sph" => Ok(VariogramModel::Spherical),
        "exponential" | "exp" => Ok(VariogramModel::Exponential),
        "gaussian" | "gau" => Ok(VariogramModel::Gaussian),
        _ => anyhow::bail!(
            "Unknown model: {}. Use spherical, exponential, or gaussian.",
            s
        ),
    }
}

fn resolve_inputs(
    input_dir: Option<PathBuf>,
    boundary: Option<PathBuf>,
    points: Option<PathBuf>,
) -> Result<(PathBuf, PathBuf)> {
    match (input_dir, boundary, points) {
        (Some(dir), _, _) => {
            let inputs = discover_inputs(&dir)
                .with_context(|| format!("Cannot discover inputs in {}", dir.display()))?;
            Ok((inputs.boundary, inputs.points))
        }
        (None, Some(boundary), Some(points)) => Ok((boundary, points)),
        _ => anyhow::bail!("Provide --input-dir, or both --boundary and --points"),
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Full pipeline ────────────────────────────────────────────
        Commands::Run {
            input_dir,
            boundary,
            points,
            output_dir,
            target,
            cell_size,
            folds,
            seed,
            idw_power,
            range,
            nugget,
            sill,
            model,
        } => {
            let model = parse_model(&model)?;
            let (boundary_path, points_path) = resolve_inputs(input_dir, boundary, points)?;

            let mut config = PipelineConfig::new(boundary_path, points_path, output_dir);
            config.target = target;
            config.cell_size = cell_size;
            config.folds = folds;
            config.seed = seed;
            config.idw.power = idw_power;
            config.fit.model = model;
            config.fit.range = range;
            config.fit.nugget = nugget;
            config.fit.sill = sill;

            let pb = spinner("Running pipeline...");
            let start = Instant::now();
            let report = run_pipeline(&config).context("Pipeline failed")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();

            println!(
                "Points: {}   Grid: {} x {}",
                report.n_points, report.grid_cols, report.grid_rows
            );
            println!(
                "Model: {} ({} estimator)  nugget={:.4} sill={:.4} range={:.2}",
                report.chosen.fitted.model,
                report.chosen.estimator,
                report.chosen.fitted.nugget,
                report.chosen.fitted.sill,
                report.chosen.fitted.range
            );
            println!(
                "Cross-validation (k={}, n={}):",
                config.folds, report.cv.n
            );
            println!("  RMSE: {:.6}", report.cv.rmse);
            println!("  ME:   {:.6}", report.cv.me);
            for path in &report.outputs {
                println!("  wrote {}", path.display());
            }
            println!("  Processing time: {:.2?}", elapsed);
        }

        // ── Variogram diagnostics ────────────────────────────────────
        Commands::Variogram {
            points,
            target,
            range,
            nugget,
            sill,
            model,
        } => {
            let model = parse_model(&model)?;

            let point_set = read_point_table(&points, &TableOptions::default())
                .with_context(|| format!("Failed to read {}", points.display()))?;
            let samples =
                sample_points(&point_set, &target).context("Cannot extract target column")?;
            let values: Vec<f64> = samples.iter().map(|p| p.value).collect();

            let init = FitInit {
                model,
                sill: sill.or(Some(sample_variance(&values))),
                range,
                nugget,
                ..Default::default()
            };

            let candidates =
                estimate_and_fit_all(&samples, &VariogramParams::default(), &init)
                    .context("Variogram estimation failed")?;

            for candidate in &candidates {
                println!("== {} ==", candidate.estimator);
                println!("{:>10} {:>14} {:>8}", "lag", "semivariance", "pairs");
                for ((lag, sv), count) in candidate
                    .empirical
                    .lags
                    .iter()
                    .zip(candidate.empirical.semivariance.iter())
                    .zip(candidate.empirical.pair_counts.iter())
                {
                    if *count == 0 {
                        println!("{:>10.3} {:>14} {:>8}", lag, "-", count);
                    } else {
                        println!("{:>10.3} {:>14.5} {:>8}", lag, sv, count);
                    }
                }
                match (&candidate.fitted, &candidate.failure) {
                    (Some(fitted), _) => println!(
                        "fit: {} nugget={:.4} sill={:.4} range={:.2} rss={:.4} converged={}\n",
                        fitted.model,
                        fitted.nugget,
                        fitted.sill,
                        fitted.range,
                        fitted.rss,
                        fitted.converged
                    ),
                    (None, Some(reason)) => println!("fit failed: {}\n", reason),
                    _ => println!("fit failed\n"),
                }
            }
        }
    }

    Ok(())
}
