//! Row-cyclic parallel solver.
//!
//! Rank [`ROOT`] owns the input and output buffers. A solve runs in four
//! collective stages, all of which every worker must enter:
//!
//! 1. broadcast of `(rows, cols)` from the root,
//! 2. `scatterv` of the cyclic row blocks,
//! 3. forward elimination with one pivot broadcast per step,
//! 4. back-substitution with one broadcast per solution entry.

use stratum_compute::{launch, Communicator, Rank};

use super::backsub::back_substitute;
use super::pivot::forward_eliminate;
use super::{admission, DimensionLayout, LocalBlock, RowCyclic};
use crate::staging::TaskData;
use crate::task::{Stage, StageTracker, Task, TaskError};
use crate::types::AugmentedMatrix;

/// Rank that holds the task data.
pub const ROOT: Rank = 0;

/// Solve on the calling worker's share of the cluster.
///
/// Only the root's `matrix` is read; other workers may pass `None`. Returns
/// `Some(solution)` on the root and `None` elsewhere.
pub fn solve_parallel<C: Communicator>(
    comm: &C,
    matrix: Option<&AugmentedMatrix>,
) -> Result<Option<Vec<f64>>, TaskError> {
    let root_matrix = matrix.filter(|_| comm.is_rank(ROOT));
    let (rows, cols) = comm.broadcast(root_matrix.map(|m| (m.rows(), m.cols())), ROOT)?;

    let map = RowCyclic::new(rows, comm.size());
    let values = comm.scatterv(root_matrix.map(|m| map.split(m)), ROOT)?;
    let mut block = LocalBlock::new(&map, comm.rank(), cols, values)?;
    log::debug!(
        "rank {}: holding {} of {} rows",
        comm.rank(),
        block.len(),
        rows
    );

    forward_eliminate(comm, &map, &mut block)?;
    let solution = back_substitute(comm, &map, &block)?;
    Ok(comm.is_rank(ROOT).then_some(solution))
}

/// Spin up a `workers`-sized cluster, solve `matrix` on it and return the
/// root's solution.
pub fn solve_distributed(matrix: &AugmentedMatrix, workers: usize) -> Result<Vec<f64>, TaskError> {
    let results = launch(workers, |comm| solve_parallel(comm, Some(matrix)))?;
    let mut solution = None;
    for (rank, result) in results.into_iter().enumerate() {
        let x = result?;
        if rank == ROOT {
            solution = x;
        }
    }
    solution.ok_or(TaskError::NoResult("gauss_parallel"))
}

/// [`solve_parallel`] behind the task lifecycle.
///
/// Every worker builds its own task around its cluster context. Only the
/// root's [`TaskData`] is inspected; the others may hold an empty one.
#[derive(Debug)]
pub struct ParallelGaussTask<'c, C: Communicator> {
    comm: &'c C,
    data: TaskData,
    layout: DimensionLayout,
    matrix: Option<AugmentedMatrix>,
    solution: Option<Vec<f64>>,
    tracker: StageTracker,
}

impl<'c, C: Communicator> ParallelGaussTask<'c, C> {
    pub fn new(comm: &'c C, data: TaskData, layout: DimensionLayout) -> Self {
        Self {
            comm,
            data,
            layout,
            matrix: None,
            solution: None,
            tracker: StageTracker::new("gauss_parallel"),
        }
    }

    pub fn is_root(&self) -> bool {
        self.comm.is_rank(ROOT)
    }

    pub fn data(&self) -> &TaskData {
        &self.data
    }

    pub fn into_data(self) -> TaskData {
        self.data
    }
}

impl<C: Communicator> Task for ParallelGaussTask<'_, C> {
    fn name(&self) -> &'static str {
        "gauss_parallel"
    }

    fn stage(&self) -> Stage {
        self.tracker.stage()
    }

    fn validation(&mut self) -> bool {
        let verdict = self.is_root().then(|| match admission::admit(&self.data, self.layout) {
            Ok(_) => true,
            Err(reason) => {
                log::debug!("{}: rejected: {}", self.name(), reason);
                false
            }
        });
        match self.comm.broadcast(verdict, ROOT) {
            Ok(true) => {
                self.tracker.enter(Stage::Validated);
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::warn!("{}: validation verdict lost: {}", self.name(), e);
                false
            }
        }
    }

    fn pre_processing(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::PreProcessed);
        if self.is_root() {
            let (rows, cols) = self.layout.read_dimensions(&self.data)?;
            let values = self.data.stage_counted::<f64>(0)?;
            self.matrix = Some(AugmentedMatrix::from_flat(rows, cols, values)?);
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::Run);
        self.solution = solve_parallel(self.comm, self.matrix.as_ref())?;
        Ok(())
    }

    fn post_processing(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::PostProcessed);
        if self.is_root() {
            let solution = self.solution.as_ref().ok_or(TaskError::NoResult(self.name()))?;
            self.data.write_output(0, solution)?;
        }
        Ok(())
    }
}
