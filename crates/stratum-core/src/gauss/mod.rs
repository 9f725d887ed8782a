//! Dense Gaussian elimination: sequential reference and row-cyclic parallel
//! solver.
//!
//! The parallel solver splits the augmented matrix into horizontal strips
//! dealt out cyclically (row `i` lives on worker `i % W`). Each forward step
//! broadcasts one pivot row from its owner; back-substitution then walks the
//! rows from last to first, broadcasting each solution entry as it is found.
//!
//! Neither path pivots. Admission checks ([`admission`]) reject systems with
//! a zero on the diagonal, and singular or rank-deficient ones, before any
//! elimination runs.

pub mod admission;
pub mod backsub;
pub mod distribution;
pub mod local;
pub mod parallel;
pub mod pivot;
pub mod sequential;

use serde::Deserialize;

use crate::staging::{BufferSchema, StagingError, TaskData};

pub use admission::{determinant, matrix_rank, Rejection};
pub use distribution::RowCyclic;
pub use local::LocalBlock;
pub use parallel::{solve_distributed, solve_parallel, ParallelGaussTask};
pub use sequential::{solve_sequential, SequentialGaussTask};

/// Magnitude below which a pivot counts as zero in the admission checks.
pub const PIVOT_EPSILON: f64 = 1e-6;

/// Where a Gauss task finds the matrix dimensions inside its [`TaskData`].
///
/// Buffer 0 always holds the row-major matrix as `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionLayout {
    /// `inputs_count[1] = cols`, `inputs_count[2] = rows`.
    #[default]
    Counts,
    /// Buffer 1 holds `rows` and buffer 2 holds `cols`, each a single `u32`.
    ScalarBuffers,
}

impl DimensionLayout {
    /// Read `(rows, cols)` from `data`.
    pub fn read_dimensions(self, data: &TaskData) -> Result<(usize, usize), StagingError> {
        match self {
            DimensionLayout::Counts => Ok((data.input_count(2)?, data.input_count(1)?)),
            DimensionLayout::ScalarBuffers => {
                let rows = data.stage::<u32>(1, BufferSchema::of::<u32>(1))?;
                let cols = data.stage::<u32>(2, BufferSchema::of::<u32>(1))?;
                Ok((rows[0] as usize, cols[0] as usize))
            }
        }
    }

    /// Build the task data for a `rows x cols` system laid out this way,
    /// with an output buffer for `rows` solution entries.
    pub fn task_data(self, rows: usize, cols: usize, values: &[f64]) -> TaskData {
        let data = TaskData::new().with_input(values);
        let data = match self {
            DimensionLayout::Counts => data.with_count(cols).with_count(rows),
            DimensionLayout::ScalarBuffers => data
                .with_input(&[rows as u32])
                .with_input(&[cols as u32]),
        };
        data.with_output::<f64>(rows)
    }
}
