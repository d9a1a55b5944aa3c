//! Dense solvers for small symmetric systems
//!
//! Least-squares fitting reduces to the normal equations `(X'X) b = X'y`,
//! a symmetric positive semi-definite system with one row per feature.
//! Systems are solved with a Cholesky factorization, falling back to an LU
//! decomposition with partial pivoting when the matrix is not numerically
//! positive definite.

use crate::{MathError, Result};
use nalgebra::{DMatrix, DVector};

const PIVOT_EPSILON: f64 = 1e-12;

/// Solve `a * x = b` for a square symmetric matrix `a` given in row-major rows
pub fn solve_symmetric(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = a.len();
    if n == 0 {
        return Err(MathError::InvalidInput("Empty system".to_string()));
    }
    if b.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a {n}x{n} matrix and a right-hand side of length {n}"
        )));
    }

    let matrix = DMatrix::from_fn(n, n, |i, j| a[i][j]);
    let rhs = DVector::from_column_slice(b);

    let solution = cholesky_solve(&matrix, &rhs)
        .or_else(|| matrix.lu().solve(&rhs))
        .ok_or_else(|| MathError::Singular("Matrix has no usable pivot".to_string()))?;

    if solution.iter().any(|v| !v.is_finite()) {
        return Err(MathError::Singular(
            "Solution contains non-finite values".to_string(),
        ));
    }

    Ok(solution.iter().copied().collect())
}

fn cholesky_solve(matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    let chol = matrix.clone().cholesky()?;
    // a zero pivot still factors, but the solve would divide by it
    if chol.l_dirty().diagonal().iter().any(|d| *d <= PIVOT_EPSILON) {
        return None;
    }
    Some(chol.solve(rhs))
}
