//! A worker's strip of the augmented matrix and the local elimination step.

use ndarray::{s, Array2, ArrayView1};
use stratum_compute::Rank;

use super::RowCyclic;
use crate::types::MatrixError;

/// The rows one worker owns, stored as a contiguous `delta x cols` block.
///
/// `global_rows[k]` is the global index of block row `k`; the list is
/// ascending, which the elimination and back-substitution rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalBlock {
    global_rows: Vec<usize>,
    data: Array2<f64>,
}

impl LocalBlock {
    /// Wrap the row-major `values` a worker received for `rank` under `map`.
    pub fn new(map: &RowCyclic, rank: Rank, cols: usize, values: Vec<f64>) -> Result<Self, MatrixError> {
        let global_rows: Vec<usize> = map.local_rows(rank).collect();
        let delta = global_rows.len();
        let got = values.len();
        let data = Array2::from_shape_vec((delta, cols), values).map_err(|_| MatrixError::Shape {
            rows: delta,
            cols,
            expected: delta * cols,
            got,
        })?;
        Ok(Self { global_rows, data })
    }

    /// Number of rows held (`delta`).
    pub fn len(&self) -> usize {
        self.global_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global_rows.is_empty()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn global_rows(&self) -> &[usize] {
        &self.global_rows
    }

    /// Block row `local`.
    pub fn row(&self, local: usize) -> ArrayView1<'_, f64> {
        self.data.row(local)
    }

    /// Entry `(local, col)` of the block.
    pub fn get(&self, local: usize, col: usize) -> f64 {
        self.data[[local, col]]
    }

    /// The right-hand side entries of the held rows.
    pub fn rhs(&self) -> Vec<f64> {
        match self.cols() {
            0 => vec![0.0; self.len()],
            cols => self.data.column(cols - 1).to_vec(),
        }
    }

    /// Number of held rows whose global index is below `row`.
    pub fn count_below(&self, row: usize) -> usize {
        self.global_rows.partition_point(|&g| g < row)
    }

    /// Eliminate column `step` from every held row below the pivot row.
    ///
    /// `row -= (row[step] / pivot[step]) * pivot`. A zero pivot is not
    /// checked here and propagates as `inf`/`nan`.
    pub fn eliminate(&mut self, step: usize, pivot: &[f64]) {
        let first = self.global_rows.partition_point(|&g| g <= step);
        let pivot = ArrayView1::from(&pivot[step..]);
        let lead = pivot[0];
        for local in first..self.len() {
            let mut row = self.data.slice_mut(s![local, step..]);
            let factor = row[0] / lead;
            row.scaled_add(-factor, &pivot);
        }
    }
}
