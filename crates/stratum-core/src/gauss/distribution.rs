//! Row-cyclic ownership map.

use stratum_compute::Rank;

use crate::types::AugmentedMatrix;

/// Row `i` of a `rows`-row system belongs to worker `i % workers`.
///
/// Worker `r` therefore owns rows `r, r + W, r + 2W, ...`, which is
/// `ceil(rows / W)` rows for the first `rows % W` workers and
/// `floor(rows / W)` for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCyclic {
    rows: usize,
    workers: usize,
}

impl RowCyclic {
    /// `workers` is clamped to at least one.
    pub fn new(rows: usize, workers: usize) -> Self {
        Self {
            rows,
            workers: workers.max(1),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Worker owning global row `row`.
    pub fn owner(&self, row: usize) -> Rank {
        row % self.workers
    }

    /// Number of rows owned by `rank` (the worker's `delta`).
    pub fn local_count(&self, rank: Rank) -> usize {
        if rank >= self.workers {
            return 0;
        }
        self.rows / self.workers + usize::from(rank < self.rows % self.workers)
    }

    /// Global indices owned by `rank`, ascending.
    pub fn local_rows(&self, rank: Rank) -> impl Iterator<Item = usize> {
        let start = if rank < self.workers { rank } else { self.rows };
        (start..self.rows).step_by(self.workers)
    }

    /// Position of global row `row` inside its owner's block.
    pub fn local_index(&self, row: usize) -> usize {
        row / self.workers
    }

    /// Split `matrix` into one row-major block per worker, in rank order.
    pub fn split(&self, matrix: &AugmentedMatrix) -> Vec<Vec<f64>> {
        (0..self.workers)
            .map(|rank| {
                let mut block = Vec::with_capacity(self.local_count(rank) * matrix.cols());
                for row in self.local_rows(rank) {
                    block.extend(matrix.row(row).iter().copied());
                }
                block
            })
            .collect()
    }
}
