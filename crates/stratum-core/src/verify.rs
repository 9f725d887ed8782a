//! Residual checks for computed solutions.

use rayon::prelude::*;

use crate::types::AugmentedMatrix;

/// Default tolerance for residuals and solver agreement.
pub const TOLERANCE: f64 = 1e-6;

/// `max_i |sum_j A[i][j] * x[j] - b[i]|` for the system `[A | b]`.
///
/// Rows are evaluated in parallel. Returns `f64::INFINITY` when `x` does not
/// have one entry per row, and `0.0` for an empty system.
pub fn max_residual(matrix: &AugmentedMatrix, x: &[f64]) -> f64 {
    let n = matrix.rows();
    if x.len() != n || matrix.cols() != n + 1 {
        return f64::INFINITY;
    }
    (0..n)
        .into_par_iter()
        .map(|i| {
            let row = matrix.row(i);
            let ax: f64 = (0..n).map(|j| row[j] * x[j]).sum();
            (ax - row[n]).abs()
        })
        .reduce(|| 0.0, worst)
}

/// Largest component-wise difference between two solutions.
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.par_iter()
        .zip(b.par_iter())
        .map(|(x, y)| (x - y).abs())
        .reduce(|| 0.0, worst)
}

/// `f64::max` that keeps NaN instead of discarding it.
fn worst(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_solution_has_zero_residual() {
        let m = AugmentedMatrix::from_flat(2, 3, vec![1.0, -1.0, -5.0, 2.0, 1.0, -7.0]).unwrap();
        assert_eq!(max_residual(&m, &[-4.0, 1.0]), 0.0);
        assert_eq!(max_residual(&m, &[-4.0, 2.0]), 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        let m = AugmentedMatrix::identity_system(3);
        assert_eq!(max_residual(&m, &[1.0]), f64::INFINITY);
        assert_eq!(max_abs_diff(&[1.0], &[1.0, 2.0]), f64::INFINITY);
        assert_eq!(max_abs_diff(&[1.0, 2.0], &[1.5, 2.0]), 0.5);
    }

    #[test]
    fn test_nan_is_not_hidden() {
        let m = AugmentedMatrix::identity_system(2);
        assert!(max_residual(&m, &[f64::NAN, 2.0]).is_nan());
    }
}
