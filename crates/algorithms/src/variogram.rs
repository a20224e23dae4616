//! Variogram computation, model fitting, and model selection
//!
//! Computes the empirical (experimental) variogram from sample points
//! under three estimators and fits theoretical models (spherical,
//! exponential, Gaussian) by weighted nonlinear least squares.
//! Prerequisite for kriging interpolation.
//!
//! The semivariance γ(h) measures spatial dissimilarity as a function of
//! separation distance h. The classical (Matheron) estimator is
//! ```text
//! γ(h) = (1/2N(h)) Σ [z(xᵢ) - z(xⱼ)]²   for all pairs with |xᵢ-xⱼ| ∈ bin(h)
//! ```
//! The pairwise-relative estimator divides each squared difference by the
//! squared pair mean, damping proportional effects; Cressie's robust
//! estimator averages √|zᵢ-zⱼ| and applies a bias correction, damping
//! outliers.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. & Hawkins, D. (1980). Robust estimation of the variogram.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use std::fmt;

use variokit_core::{Error, Result};

use crate::linalg;
use crate::SamplePoint;

/// Empirical-variogram estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimator {
    /// Classical squared-difference averaging (Matheron 1963)
    Matheron,
    /// Squared differences relative to the squared pair mean
    PairwiseRelative,
    /// Cressie & Hawkins (1980) robust estimator
    Cressie,
}

impl Estimator {
    /// All estimators, in the order the pipeline computes them
    pub const ALL: [Estimator; 3] = [
        Estimator::Matheron,
        Estimator::PairwiseRelative,
        Estimator::Cressie,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Estimator::Matheron => "matheron",
            Estimator::PairwiseRelative => "pairwise-relative",
            Estimator::Cressie => "cressie",
        }
    }
}

impl fmt::Display for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Empirical variogram: semivariance values at discrete lag distances.
#[derive(Debug, Clone)]
pub struct EmpiricalVariogram {
    /// Estimator that produced the semivariances
    pub estimator: Estimator,
    /// Lag distances (bin centers)
    pub lags: Vec<f64>,
    /// Semivariance values γ(h) at each lag (NaN for empty bins)
    pub semivariance: Vec<f64>,
    /// Number of point pairs contributing to each lag bin
    pub pair_counts: Vec<usize>,
}

/// Theoretical variogram model type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariogramModel {
    /// Spherical model: γ(h) = c₀ + c·[1.5(h/a) - 0.5(h/a)³] for h ≤ a; c₀+c for h > a
    Spherical,
    /// Exponential model: γ(h) = c₀ + c·[1 - exp(-3h/a)]
    Exponential,
    /// Gaussian model: γ(h) = c₀ + c·[1 - exp(-3h²/a²)]
    Gaussian,
}

impl VariogramModel {
    pub fn name(&self) -> &'static str {
        match self {
            VariogramModel::Spherical => "spherical",
            VariogramModel::Exponential => "exponential",
            VariogramModel::Gaussian => "gaussian",
        }
    }
}

impl fmt::Display for VariogramModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fitted variogram model parameters
#[derive(Debug, Clone)]
pub struct FittedVariogram {
    /// Model type
    pub model: VariogramModel,
    /// Nugget (c₀): semivariance at h → 0
    pub nugget: f64,
    /// Sill (c₀ + c): semivariance at which the model levels off
    pub sill: f64,
    /// Range (a): distance at which semivariance reaches ~95% of sill
    pub range: f64,
    /// Partial sill (c = sill - nugget)
    pub partial_sill: f64,
    /// Weighted residual sum of squares from fitting (lower = better)
    pub rss: f64,
    /// Whether the least-squares iteration converged
    pub converged: bool,
}

impl FittedVariogram {
    /// Evaluate the fitted variogram model at distance h
    pub fn evaluate(&self, h: f64) -> f64 {
        if h < 1e-15 {
            return 0.0;
        }
        model_value(self.model, h, self.nugget, self.partial_sill, self.range)
    }

    /// Whether this model carries a usable sill: finite, non-negative,
    /// with all parameters finite.
    pub fn has_usable_sill(&self) -> bool {
        self.sill.is_finite()
            && self.sill >= 0.0
            && self.nugget.is_finite()
            && self.range.is_finite()
            && self.range > 0.0
    }
}

fn model_value(model: VariogramModel, h: f64, c0: f64, c: f64, a: f64) -> f64 {
    match model {
        VariogramModel::Spherical => {
            if h >= a {
                c0 + c
            } else {
                let hr = h / a;
                c0 + c * (1.5 * hr - 0.5 * hr * hr * hr)
            }
        }
        VariogramModel::Exponential => c0 + c * (1.0 - (-3.0 * h / a).exp()),
        VariogramModel::Gaussian => c0 + c * (1.0 - (-3.0 * h * h / (a * a)).exp()),
    }
}

/// Partial derivatives of γ(h; c₀, c, a) with respect to (c₀, c, a)
fn model_gradient(model: VariogramModel, h: f64, c: f64, a: f64) -> [f64; 3] {
    match model {
        VariogramModel::Spherical => {
            if h >= a {
                [1.0, 1.0, 0.0]
            } else {
                let hr = h / a;
                let dc = 1.5 * hr - 0.5 * hr * hr * hr;
                let da = c * 1.5 * (h * h * h / (a * a * a * a) - h / (a * a));
                [1.0, dc, da]
            }
        }
        VariogramModel::Exponential => {
            let e = (-3.0 * h / a).exp();
            [1.0, 1.0 - e, -3.0 * c * h / (a * a) * e]
        }
        VariogramModel::Gaussian => {
            let e = (-3.0 * h * h / (a * a)).exp();
            [1.0, 1.0 - e, -6.0 * c * h * h / (a * a * a) * e]
        }
    }
}

/// Parameters for empirical variogram computation
#[derive(Debug, Clone)]
pub struct VariogramParams {
    /// Number of lag bins (default 15)
    pub n_lags: usize,
    /// Maximum lag distance. If None, auto-computed as half the max pairwise distance.
    pub max_lag: Option<f64>,
}

impl Default for VariogramParams {
    fn default() -> Self {
        Self {
            n_lags: 15,
            max_lag: None,
        }
    }
}

/// Initial values and controls for variogram model fitting.
///
/// The pipeline seeds the sill with the sample variance of the target
/// variable; standalone callers may leave it `None` to start from the
/// largest empirical semivariance.
#[derive(Debug, Clone)]
pub struct FitInit {
    /// Model family to fit (default spherical)
    pub model: VariogramModel,
    /// Initial sill. `None` → max empirical semivariance.
    pub sill: Option<f64>,
    /// Initial range in spatial units (default 400)
    pub range: f64,
    /// Initial nugget (default 0)
    pub nugget: f64,
    /// Iteration cap for the least-squares loop
    pub max_iterations: usize,
    /// Relative improvement below which the fit is converged
    pub tolerance: f64,
}

impl Default for FitInit {
    fn default() -> Self {
        Self {
            model: VariogramModel::Spherical,
            sill: None,
            range: 400.0,
            nugget: 0.0,
            max_iterations: 100,
            tolerance: 1e-10,
        }
    }
}

/// Compute the empirical (experimental) variogram from sample points.
///
/// # Arguments
/// * `points` — Sample points with (x, y, value)
/// * `estimator` — Semivariance estimator to apply per lag bin
/// * `params` — Binning parameters (number of lags, max distance)
///
/// # Errors
/// [`Error::VariogramFit`] with fewer than 2 points or a non-positive
/// maximum lag.
pub fn empirical_variogram(
    points: &[SamplePoint],
    estimator: Estimator,
    params: &VariogramParams,
) -> Result<EmpiricalVariogram> {
    let n = points.len();
    if n < 2 {
        return Err(Error::VariogramFit(
            "need at least 2 points to estimate a variogram".into(),
        ));
    }
    if params.n_lags == 0 {
        return Err(Error::InvalidParameter {
            name: "n_lags",
            value: "0".into(),
            reason: "need at least one lag bin".into(),
        });
    }

    let max_lag = match params.max_lag {
        Some(m) => m,
        None => {
            let mut max_dist = 0.0_f64;
            for i in 0..n {
                for j in (i + 1)..n {
                    let d = points[i].dist(points[j].x, points[j].y);
                    if d > max_dist {
                        max_dist = d;
                    }
                }
            }
            max_dist / 2.0 // Convention: max lag = half of max distance
        }
    };

    if max_lag <= 0.0 {
        return Err(Error::VariogramFit(
            "maximum lag is not positive (all points coincident?)".into(),
        ));
    }

    let n_lags = params.n_lags;
    let bin_width = max_lag / n_lags as f64;

    let lags: Vec<f64> = (0..n_lags).map(|k| (k as f64 + 0.5) * bin_width).collect();
    let mut acc = vec![0.0_f64; n_lags];
    let mut pair_counts = vec![0_usize; n_lags];

    for i in 0..n {
        for j in (i + 1)..n {
            let d = points[i].dist(points[j].x, points[j].y);
            if d >= max_lag {
                continue;
            }
            let bin = (d / bin_width) as usize;
            if bin >= n_lags {
                continue;
            }

            let dz = points[i].value - points[j].value;
            match estimator {
                Estimator::Matheron => {
                    acc[bin] += dz * dz;
                    pair_counts[bin] += 1;
                }
                Estimator::PairwiseRelative => {
                    let mean = (points[i].value + points[j].value) / 2.0;
                    if mean.abs() > 1e-300 {
                        let r = dz / mean;
                        acc[bin] += r * r;
                        pair_counts[bin] += 1;
                    }
                }
                Estimator::Cressie => {
                    acc[bin] += dz.abs().sqrt();
                    pair_counts[bin] += 1;
                }
            }
        }
    }

    let semivariance: Vec<f64> = acc
        .iter()
        .zip(pair_counts.iter())
        .map(|(&sum, &count)| {
            if count == 0 {
                return f64::NAN;
            }
            let nf = count as f64;
            match estimator {
                Estimator::Matheron | Estimator::PairwiseRelative => sum / (2.0 * nf),
                Estimator::Cressie => {
                    let mean_root = sum / nf;
                    let fourth = mean_root * mean_root * mean_root * mean_root;
                    fourth / (2.0 * (0.457 + 0.494 / nf))
                }
            }
        })
        .collect();

    Ok(EmpiricalVariogram {
        estimator,
        lags,
        semivariance,
        pair_counts,
    })
}

/// Fit a theoretical variogram model to an empirical variogram.
///
/// Weighted nonlinear least squares over (nugget, partial sill, range)
/// with weights = pair counts (Cressie 1985), iterated by
/// Levenberg–Marquardt from the `FitInit` starting values.
///
/// # Errors
/// [`Error::VariogramFit`] with fewer than 3 non-empty lag bins or when
/// the iteration diverges to non-finite parameters.
pub fn fit_variogram(empirical: &EmpiricalVariogram, init: &FitInit) -> Result<FittedVariogram> {
    // Collect valid (non-NaN) lag/semivariance pairs with counts
    let valid: Vec<(f64, f64, f64)> = empirical
        .lags
        .iter()
        .zip(empirical.semivariance.iter())
        .zip(empirical.pair_counts.iter())
        .filter(|((_, sv), cnt)| sv.is_finite() && **cnt > 0)
        .map(|((&lag, &sv), &cnt)| (lag, sv, cnt as f64))
        .collect();

    if valid.len() < 3 {
        return Err(Error::VariogramFit(format!(
            "need at least 3 non-empty lag bins to fit a model, got {}",
            valid.len()
        )));
    }

    let max_sv = valid.iter().map(|&(_, sv, _)| sv).fold(0.0_f64, f64::max);
    if max_sv <= 0.0 {
        // All semivariances are zero: the data are spatially constant and
        // the zero variogram fits exactly.
        return Ok(FittedVariogram {
            model: init.model,
            nugget: 0.0,
            sill: 0.0,
            range: init.range,
            partial_sill: 0.0,
            rss: 0.0,
            converged: true,
        });
    }

    let max_lag = valid.last().map(|&(lag, _, _)| lag).unwrap_or(1.0);
    let min_range = max_lag * 1e-6;

    let sill0 = init.sill.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(max_sv);
    let nugget0 = init.nugget.max(0.0).min(sill0);
    let mut theta = [
        nugget0,
        (sill0 - nugget0).max(max_sv * 1e-3),
        init.range.max(min_range),
    ];

    let sse_of = |t: &[f64; 3]| -> f64 {
        valid
            .iter()
            .map(|&(lag, sv, w)| {
                let r = model_value(init.model, lag, t[0], t[1], t[2]) - sv;
                w * r * r
            })
            .sum()
    };

    let mut sse = sse_of(&theta);
    let mut lambda = 1e-3;
    let mut converged = false;

    for _ in 0..init.max_iterations {
        if sse <= f64::EPSILON {
            converged = true;
            break;
        }

        // Normal equations J^T W J δ = J^T W r
        let mut normal = [0.0_f64; 9];
        let mut gradient = [0.0_f64; 3];
        for &(lag, sv, w) in &valid {
            let g = model_gradient(init.model, lag, theta[1], theta[2]);
            let r = model_value(init.model, lag, theta[0], theta[1], theta[2]) - sv;
            for a in 0..3 {
                gradient[a] += w * g[a] * r;
                for b in 0..3 {
                    normal[a * 3 + b] += w * g[a] * g[b];
                }
            }
        }

        // Marquardt damping on the diagonal
        let mut damped = normal;
        for a in 0..3 {
            damped[a * 3 + a] += lambda * normal[a * 3 + a].max(1e-12);
        }

        let mut rhs = gradient;
        let step = match linalg::solve(3, &mut damped, &mut rhs) {
            Ok(step) => step,
            Err(_) => {
                lambda *= 10.0;
                if lambda > 1e12 {
                    break;
                }
                continue;
            }
        };

        let candidate = [
            (theta[0] - step[0]).max(0.0),
            (theta[1] - step[1]).max(0.0),
            (theta[2] - step[2]).max(min_range),
        ];
        let candidate_sse = sse_of(&candidate);

        if candidate_sse.is_finite() && candidate_sse < sse {
            let improvement = (sse - candidate_sse) / sse.max(f64::EPSILON);
            theta = candidate;
            sse = candidate_sse;
            lambda = (lambda * 0.1).max(1e-12);
            if improvement < init.tolerance {
                converged = true;
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                // No descent direction left at any damping
                converged = true;
                break;
            }
        }
    }

    if !theta.iter().all(|v| v.is_finite()) || !sse.is_finite() {
        return Err(Error::VariogramFit(format!(
            "{} fit diverged to non-finite parameters",
            empirical.estimator
        )));
    }

    Ok(FittedVariogram {
        model: init.model,
        nugget: theta[0],
        sill: theta[0] + theta[1],
        range: theta[2],
        partial_sill: theta[1],
        rss: sse,
        converged,
    })
}

/// An estimator's empirical variogram together with its fit outcome.
#[derive(Debug, Clone)]
pub struct VariogramCandidate {
    pub estimator: Estimator,
    pub empirical: EmpiricalVariogram,
    pub fitted: Option<FittedVariogram>,
    /// Failure message when fitting did not produce a model
    pub failure: Option<String>,
}

/// Compute and fit an empirical variogram for every estimator.
///
/// A fit failure for one estimator is recorded in its candidate rather
/// than aborting the others; selection decides what is fatal.
pub fn estimate_and_fit_all(
    points: &[SamplePoint],
    params: &VariogramParams,
    init: &FitInit,
) -> Result<Vec<VariogramCandidate>> {
    Estimator::ALL
        .iter()
        .map(|&estimator| {
            let empirical = empirical_variogram(points, estimator, params)?;
            let candidate = match fit_variogram(&empirical, init) {
                Ok(fitted) => VariogramCandidate {
                    estimator,
                    empirical,
                    fitted: Some(fitted),
                    failure: None,
                },
                Err(e) => VariogramCandidate {
                    estimator,
                    empirical,
                    fitted: None,
                    failure: Some(e.to_string()),
                },
            };
            Ok(candidate)
        })
        .collect()
}

/// Default model-selection preference: Cressie first, Matheron fallback.
pub const DEFAULT_PREFERENCE: [Estimator; 2] = [Estimator::Cressie, Estimator::Matheron];

/// The model chosen for interpolation, with its originating estimator.
#[derive(Debug, Clone)]
pub struct ChosenModel {
    pub estimator: Estimator,
    pub fitted: FittedVariogram,
}

/// Select the interpolation model from the fitted candidates.
///
/// Walks `preference` in order and takes the first candidate whose fit
/// succeeded with a usable sill. If no candidate qualifies the failure is
/// explicit: [`Error::VariogramFit`] — never a null model propagated
/// downstream.
pub fn select_model(
    candidates: &[VariogramCandidate],
    preference: &[Estimator],
) -> Result<ChosenModel> {
    for &wanted in preference {
        let candidate = candidates.iter().find(|c| c.estimator == wanted);
        if let Some(candidate) = candidate {
            if let Some(fitted) = &candidate.fitted {
                if fitted.has_usable_sill() {
                    return Ok(ChosenModel {
                        estimator: wanted,
                        fitted: fitted.clone(),
                    });
                }
            }
        }
    }

    let tried: Vec<String> = preference.iter().map(|e| e.to_string()).collect();
    Err(Error::VariogramFit(format!(
        "no candidate produced a usable sill (tried: {})",
        tried.join(", ")
    )))
}

/// Sample variance with the n-1 denominator; 0 for fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n as f64 - 1.0)
}
