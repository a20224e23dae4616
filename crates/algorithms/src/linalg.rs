//! Dense linear solves for the small systems this crate builds
//!
//! Both the kriging system (n neighbors + Lagrange constraint) and the
//! variogram fitter's normal equations are tiny, so Gaussian elimination
//! with partial pivoting is all that is needed.

use variokit_core::{Error, Result};

/// Solve Ax = b in place using Gaussian elimination with partial pivoting.
///
/// `mat` is row-major n×n; `rhs` has length n. Both are clobbered.
///
/// # Errors
/// [`Error::Algorithm`] when the matrix is singular to working precision.
pub(crate) fn solve(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<Vec<f64>> {
    // Forward elimination
    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < 1e-14 {
            return Err(Error::Algorithm("singular matrix".into()));
        }

        if max_row != col {
            for j in 0..n {
                let a = col * n + j;
                let b = max_row * n + j;
                mat.swap(a, b);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    // Back substitution
    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * x[j];
        }
        x[col] = sum / mat[col * n + col];
    }

    Ok(x)
}
