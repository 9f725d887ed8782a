//! Single-worker Gaussian elimination, used as the reference solver.

use ndarray::s;

use super::{admission, DimensionLayout};
use crate::staging::TaskData;
use crate::task::{Stage, StageTracker, Task, TaskError};
use crate::types::AugmentedMatrix;

/// Solve `[A | b]` without pivoting.
///
/// Forward elimination normalises each pivot row to a unit diagonal and
/// clears the column below it; back-substitution then needs no division.
/// Works on a copy, so `matrix` is left untouched.
pub fn solve_sequential(matrix: &AugmentedMatrix) -> Vec<f64> {
    let n = matrix.rows();
    let mut a = matrix.view().to_owned();

    for i in 0..n {
        let lead = a[[i, i]];
        a.slice_mut(s![i, i..]).mapv_inplace(|v| v / lead);
        let pivot = a.slice(s![i, i..]).to_owned();
        for j in i + 1..n {
            let factor = a[[j, i]];
            a.slice_mut(s![j, i..]).scaled_add(-factor, &pivot);
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let tail: f64 = (i + 1..n).map(|j| a[[i, j]] * x[j]).sum();
        x[i] = a[[i, n]] - tail;
    }
    x
}

/// [`solve_sequential`] behind the task lifecycle.
#[derive(Debug)]
pub struct SequentialGaussTask {
    data: TaskData,
    layout: DimensionLayout,
    matrix: Option<AugmentedMatrix>,
    solution: Option<Vec<f64>>,
    tracker: StageTracker,
}

impl SequentialGaussTask {
    pub fn new(data: TaskData, layout: DimensionLayout) -> Self {
        Self {
            data,
            layout,
            matrix: None,
            solution: None,
            tracker: StageTracker::new("gauss_sequential"),
        }
    }

    pub fn data(&self) -> &TaskData {
        &self.data
    }

    pub fn into_data(self) -> TaskData {
        self.data
    }
}

impl Task for SequentialGaussTask {
    fn name(&self) -> &'static str {
        "gauss_sequential"
    }

    fn stage(&self) -> Stage {
        self.tracker.stage()
    }

    fn validation(&mut self) -> bool {
        match admission::admit(&self.data, self.layout) {
            Ok(_) => {
                self.tracker.enter(Stage::Validated);
                true
            }
            Err(reason) => {
                log::debug!("{}: rejected: {}", self.name(), reason);
                false
            }
        }
    }

    fn pre_processing(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::PreProcessed);
        let (rows, cols) = self.layout.read_dimensions(&self.data)?;
        let values = self.data.stage_counted::<f64>(0)?;
        self.matrix = Some(AugmentedMatrix::from_flat(rows, cols, values)?);
        Ok(())
    }

    fn run(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::Run);
        let matrix = self.matrix.as_ref().ok_or(TaskError::NoResult(self.name()))?;
        self.solution = Some(solve_sequential(matrix));
        Ok(())
    }

    fn post_processing(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::PostProcessed);
        let solution = self.solution.as_ref().ok_or(TaskError::NoResult(self.name()))?;
        self.data.write_output(0, solution)?;
        Ok(())
    }
}
