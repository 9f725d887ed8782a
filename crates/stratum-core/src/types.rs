//! Core types shared across the Stratum kernels.
//!
//! The central structure is the [`AugmentedMatrix`]: the coefficient matrix of
//! a linear system with the right-hand side appended as its last column.

use ndarray::{s, Array2, ArrayView1, ArrayView2};
use thiserror::Error;

/// Errors raised when building matrices from flat data.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("A {rows}x{cols} matrix needs {expected} values, got {got}")]
    Shape {
        rows: usize,
        cols: usize,
        expected: usize,
        got: usize,
    },
}

/// Dense augmented matrix `[A | b]`, stored row-major.
///
/// For a well-formed system `cols == rows + 1`. The constructors do not
/// enforce this; admission checks do (see [`crate::gauss::admission`]).
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedMatrix {
    data: Array2<f64>,
}

impl AugmentedMatrix {
    /// Build a matrix from `rows * cols` row-major values.
    pub fn from_flat(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self, MatrixError> {
        let got = values.len();
        Array2::from_shape_vec((rows, cols), values)
            .map(|data| Self { data })
            .map_err(|_| MatrixError::Shape {
                rows,
                cols,
                expected: rows * cols,
                got,
            })
    }

    /// The `n x n` identity system with right-hand side `1, 2, ..., n`.
    ///
    /// Its solution is the right-hand side itself.
    pub fn identity_system(n: usize) -> Self {
        let mut data = Array2::zeros((n, n + 1));
        for i in 0..n {
            data[[i, i]] = 1.0;
            data[[i, n]] = (i + 1) as f64;
        }
        Self { data }
    }

    /// A deterministic, strictly diagonally dominant `n x n` system.
    ///
    /// Entries are drawn from a cheap modular sequence keyed by `seed`, so the
    /// same `(n, seed)` always yields the same matrix. Diagonal dominance keeps
    /// elimination without pivoting stable.
    pub fn diagonally_dominant(n: usize, seed: u64) -> Self {
        let seed = seed as usize;
        let mut data = Array2::zeros((n, n + 1));
        for i in 0..n {
            let mut off_diagonal = 0.0;
            for j in 0..n {
                let raw = (i * 137 + j * 251 + seed * 31 + 31) % 997;
                let value = 10.0 * (raw as f64 / 997.0 - 0.5);
                data[[i, j]] = value;
                if i != j {
                    off_diagonal += value.abs();
                }
            }
            data[[i, i]] = off_diagonal + 1.0 + (i % 7) as f64;
            let raw = (i * 193 + seed * 7 + 41) % 983;
            data[[i, n]] = 100.0 * (raw as f64 / 983.0 - 0.5);
        }
        Self { data }
    }

    /// Number of equations.
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns, right-hand side included.
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Whether the shape is that of a square system, `cols == rows + 1`.
    pub fn is_square_system(&self) -> bool {
        self.cols() == self.rows() + 1
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.row(i)
    }

    /// Row-major copy of every entry.
    pub fn to_flat(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Row-major copy of the leading `rows x rows` coefficient block.
    pub fn coefficient_block(&self) -> Vec<f64> {
        let n = self.rows().min(self.cols());
        self.data.slice(s![..n, ..n]).iter().copied().collect()
    }

    /// Copy of the right-hand side column.
    pub fn rhs(&self) -> Vec<f64> {
        match self.cols() {
            0 => Vec::new(),
            cols => self.data.column(cols - 1).to_vec(),
        }
    }
}
