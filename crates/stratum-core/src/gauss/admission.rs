//! Admission checks run during validation: diagonal, determinant and rank.
//!
//! Both functions take their matrix by value and eliminate on that throwaway
//! copy.

use thiserror::Error;

use super::{DimensionLayout, PIVOT_EPSILON};
use crate::staging::{StagingError, TaskData};
use crate::types::AugmentedMatrix;

/// Why a system was refused.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("Dimensions unavailable: {0}")]
    Dimensions(#[source] StagingError),

    #[error("System has no rows")]
    Empty,

    #[error("A {rows}x{cols} matrix is not an augmented square system")]
    NotAugmented { rows: usize, cols: usize },

    #[error("Matrix buffer holds {got} values, {expected} expected")]
    MatrixCount { expected: usize, got: usize },

    #[error("Output buffer unavailable: {0}")]
    Output(#[source] StagingError),

    #[error("Output buffer holds {got} values, {expected} expected")]
    OutputCount { expected: usize, got: usize },

    #[error("Matrix buffer unreadable: {0}")]
    Matrix(#[source] StagingError),

    #[error("A {rows}x{cols} system does not fit in memory")]
    Oversized { rows: usize, cols: usize },

    #[error("Diagonal entry ({index}, {index}) is zero")]
    ZeroDiagonal { index: usize },

    #[error("Coefficient matrix is singular")]
    Singular,

    #[error("Coefficient matrix has rank {rank}, {rows} required")]
    RankDeficient { rank: usize, rows: usize },
}

/// Determinant of the leading `n x n` block of a row-major `n x m` matrix.
///
/// Uses partial pivoting; each row swap flips the sign. Returns `0.0` as soon
/// as the best available pivot is smaller than [`PIVOT_EPSILON`], and also
/// when `m < n` leaves no square block to work on.
pub fn determinant(n: usize, m: usize, mut a: Vec<f64>) -> f64 {
    if m < n || n.checked_mul(m).map_or(true, |len| a.len() < len) {
        return 0.0;
    }

    let mut det = 1.0;
    for i in 0..n {
        let mut best = i;
        for j in i + 1..n {
            if a[j * m + i].abs() > a[best * m + i].abs() {
                best = j;
            }
        }
        if a[best * m + i].abs() < PIVOT_EPSILON {
            return 0.0;
        }
        if best != i {
            for k in 0..m {
                a.swap(i * m + k, best * m + k);
            }
            det = -det;
        }

        let pivot = a[i * m + i];
        det *= pivot;
        for j in i + 1..n {
            let factor = a[j * m + i] / pivot;
            for k in i..n {
                a[j * m + k] -= factor * a[i * m + k];
            }
        }
    }
    det
}

/// Rank of a row-major `n x m` matrix.
///
/// Starts from `m` and loses one for every column that has no entry above
/// [`PIVOT_EPSILON`] among the rows not yet used as pivots. Rows are never
/// physically swapped.
pub fn matrix_rank(n: usize, m: usize, mut a: Vec<f64>) -> usize {
    if n.checked_mul(m).map_or(true, |len| a.len() < len) {
        return 0;
    }

    let mut rank = m;
    let mut used = vec![false; n];
    for col in 0..m {
        let Some(p) = (0..n).find(|&row| !used[row] && a[row * m + col].abs() > PIVOT_EPSILON) else {
            rank -= 1;
            continue;
        };
        used[p] = true;

        let pivot = a[p * m + col];
        for k in col + 1..m {
            a[p * m + k] /= pivot;
        }
        for row in (0..n).filter(|&row| row != p) {
            let factor = a[row * m + col];
            if factor.abs() > PIVOT_EPSILON {
                for k in col + 1..m {
                    a[row * m + k] -= a[p * m + k] * factor;
                }
            }
        }
    }
    rank
}

/// Run every admission check on a Gauss task's data.
///
/// Neither solver pivots, so an exact zero on the diagonal is refused even
/// when the system itself is regular. On success returns the staged system
/// so callers can reuse it.
pub fn admit(data: &TaskData, layout: DimensionLayout) -> Result<AugmentedMatrix, Rejection> {
    let (rows, cols) = layout.read_dimensions(data).map_err(Rejection::Dimensions)?;
    if rows == 0 {
        return Err(Rejection::Empty);
    }
    if rows.checked_add(1) != Some(cols) {
        return Err(Rejection::NotAugmented { rows, cols });
    }

    let expected = rows
        .checked_mul(cols)
        .ok_or(Rejection::Oversized { rows, cols })?;
    let got = data.input_count(0).map_err(Rejection::Matrix)?;
    if got != expected {
        return Err(Rejection::MatrixCount { expected, got });
    }
    let out = data.output_count(0).map_err(Rejection::Output)?;
    if out != rows {
        return Err(Rejection::OutputCount {
            expected: rows,
            got: out,
        });
    }

    let values = data.stage_counted::<f64>(0).map_err(Rejection::Matrix)?;
    let matrix = AugmentedMatrix::from_flat(rows, cols, values)
        .map_err(|_| Rejection::MatrixCount { expected, got })?;

    if let Some(index) = (0..rows).find(|&i| matrix.row(i)[i] == 0.0) {
        return Err(Rejection::ZeroDiagonal { index });
    }
    if determinant(rows, cols, matrix.to_flat()) == 0.0 {
        return Err(Rejection::Singular);
    }
    // Backs up the determinant: a block that passes the pivoted determinant
    // check also has full rank.
    let rank = matrix_rank(rows, rows, matrix.coefficient_block());
    if rank != rows {
        return Err(Rejection::RankDeficient { rank, rows });
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_determinant_of_small_systems() {
        // Augmented column is ignored.
        assert_abs_diff_eq!(determinant(2, 3, vec![1.0, -1.0, -5.0, 2.0, 1.0, -7.0]), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            determinant(3, 4, vec![3.0, 2.0, -5.0, -1.0, 2.0, -1.0, 3.0, 13.0, 1.0, 2.0, -1.0, 9.0]),
            -30.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_determinant_sign_follows_swaps() {
        assert_abs_diff_eq!(determinant(2, 2, vec![0.0, 1.0, 1.0, 0.0]), -1.0);
        assert_abs_diff_eq!(determinant(2, 2, vec![2.0, 0.0, 0.0, 3.0]), 6.0);
    }

    #[test]
    fn test_determinant_of_singular_block_is_zero() {
        assert_eq!(determinant(2, 3, vec![1.0, 2.0, 3.0, 2.0, 4.0, 5.0]), 0.0);
        assert_eq!(determinant(2, 1, vec![1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_rank() {
        assert_eq!(matrix_rank(2, 2, vec![1.0, 2.0, 2.0, 4.0]), 1);
        assert_eq!(matrix_rank(3, 3, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]), 3);
        assert_eq!(matrix_rank(2, 2, vec![0.0; 4]), 0);
        // Needs a pivot from a later row without swapping.
        assert_eq!(matrix_rank(2, 2, vec![0.0, 1.0, 1.0, 0.0]), 2);
    }

    #[test]
    fn test_admit_survives_huge_dimensions() {
        let layout = DimensionLayout::Counts;
        let max_rows = TaskData::new()
            .with_input(&[1.0_f64])
            .with_count(3)
            .with_count(usize::MAX)
            .with_output::<f64>(1);
        assert!(matches!(
            admit(&max_rows, layout),
            Err(Rejection::NotAugmented { rows: usize::MAX, cols: 3 })
        ));

        let rows = 1_usize << 33;
        let wide = TaskData::new()
            .with_input(&[1.0_f64])
            .with_count(rows + 1)
            .with_count(rows)
            .with_output::<f64>(1);
        assert!(matches!(admit(&wide, layout), Err(Rejection::Oversized { .. })));
    }

    #[test]
    fn test_admit_accepts_regular_system() {
        let data = DimensionLayout::Counts.task_data(2, 3, &[1.0, -1.0, -5.0, 2.0, 1.0, -7.0]);
        let matrix = admit(&data, DimensionLayout::Counts).unwrap();
        assert_eq!(matrix.rows(), 2);
    }

    #[test]
    fn test_admit_reasons() {
        let layout = DimensionLayout::Counts;
        let empty = layout.task_data(0, 0, &[]);
        assert!(matches!(admit(&empty, layout), Err(Rejection::Empty)));

        let single = layout.task_data(1, 1, &[4.0]);
        assert!(matches!(
            admit(&single, layout),
            Err(Rejection::NotAugmented { rows: 1, cols: 1 })
        ));

        let short = TaskData::new()
            .with_input(&[1.0_f64, 2.0])
            .with_count(3)
            .with_count(2)
            .with_output::<f64>(2);
        assert!(matches!(
            admit(&short, layout),
            Err(Rejection::MatrixCount { expected: 6, got: 2 })
        ));

        let wrong_output = TaskData::new()
            .with_input(&[1.0_f64, -1.0, -5.0, 2.0, 1.0, -7.0])
            .with_count(3)
            .with_count(2)
            .with_output::<f64>(1);
        assert!(matches!(
            admit(&wrong_output, layout),
            Err(Rejection::OutputCount { expected: 2, got: 1 })
        ));

        let singular = layout.task_data(2, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 6.0]);
        assert!(matches!(admit(&singular, layout), Err(Rejection::Singular)));

        let swapped = layout.task_data(2, 3, &[0.0, 1.0, 1.0, 1.0, 0.0, 2.0]);
        assert!(matches!(admit(&swapped, layout), Err(Rejection::ZeroDiagonal { index: 0 })));
        let late = layout.task_data(2, 3, &[1.0, 2.0, 3.0, 4.0, 0.0, 5.0]);
        assert!(matches!(admit(&late, layout), Err(Rejection::ZeroDiagonal { index: 1 })));

        let no_dims = TaskData::new().with_input(&[1.0_f64]);
        assert!(matches!(admit(&no_dims, layout), Err(Rejection::Dimensions(_))));
    }
}
