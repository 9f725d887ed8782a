//! Vector-sum reduction: a sequential fold and a scatter + reduce pair.

use std::ops::Range;

use stratum_compute::{CommError, Communicator, Rank};

use crate::staging::{Element, TaskData};
use crate::task::{Stage, StageTracker, Task, TaskError};

const ROOT: Rank = 0;

/// An element type with an identity and an associative combine.
pub trait Reducible: Element + Copy {
    const ZERO: Self;

    fn combine(self, other: Self) -> Self;
}

impl Reducible for i32 {
    const ZERO: Self = 0;

    fn combine(self, other: Self) -> Self {
        self.wrapping_add(other)
    }
}

impl Reducible for i64 {
    const ZERO: Self = 0;

    fn combine(self, other: Self) -> Self {
        self.wrapping_add(other)
    }
}

impl Reducible for f32 {
    const ZERO: Self = 0.0;

    fn combine(self, other: Self) -> Self {
        self + other
    }
}

impl Reducible for f64 {
    const ZERO: Self = 0.0;

    fn combine(self, other: Self) -> Self {
        self + other
    }
}

pub fn sum_sequential<T: Reducible>(values: &[T]) -> T {
    values.iter().fold(T::ZERO, |acc, &v| acc.combine(v))
}

/// Split `len` elements into `workers` contiguous ranges.
///
/// The first `len % workers` ranges hold one extra element.
pub fn block_partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let base = len / workers;
    let extra = len % workers;
    let mut start = 0;
    (0..workers)
        .map(|rank| {
            let size = base + usize::from(rank < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

/// Sum the root's `values` across the cluster.
///
/// Returns `Some(total)` on the root and `None` elsewhere.
pub fn sum_parallel<C, T>(comm: &C, values: Option<&[T]>) -> Result<Option<T>, CommError>
where
    C: Communicator,
    T: Reducible,
{
    let chunks = values.filter(|_| comm.is_rank(ROOT)).map(|values| {
        block_partition(values.len(), comm.size())
            .into_iter()
            .map(|range| values[range].to_vec())
            .collect::<Vec<_>>()
    });
    let mine = comm.scatterv(chunks, ROOT)?;
    let partial = sum_sequential(&mine);
    comm.reduce(partial, T::combine, ROOT)
}

/// [`sum_sequential`] behind the task lifecycle.
#[derive(Debug)]
pub struct VectorSumSequential<T: Reducible> {
    data: TaskData,
    input: Vec<T>,
    total: Option<T>,
    tracker: StageTracker,
}

impl<T: Reducible> VectorSumSequential<T> {
    pub fn new(data: TaskData) -> Self {
        Self {
            data,
            input: Vec::new(),
            total: None,
            tracker: StageTracker::new("vector_sum_sequential"),
        }
    }

    pub fn data(&self) -> &TaskData {
        &self.data
    }
}

impl<T: Reducible> Task for VectorSumSequential<T> {
    fn name(&self) -> &'static str {
        "vector_sum_sequential"
    }

    fn stage(&self) -> Stage {
        self.tracker.stage()
    }

    fn validation(&mut self) -> bool {
        let ok = single_output(&self.data);
        if ok {
            self.tracker.enter(Stage::Validated);
        } else {
            log::debug!("{}: output must hold exactly one element", self.name());
        }
        ok
    }

    fn pre_processing(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::PreProcessed);
        self.input = self.data.stage_counted(0)?;
        Ok(())
    }

    fn run(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::Run);
        self.total = Some(sum_sequential(&self.input));
        Ok(())
    }

    fn post_processing(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::PostProcessed);
        let total = self.total.ok_or(TaskError::NoResult(self.name()))?;
        self.data.write_output(0, &[total])?;
        Ok(())
    }
}

/// [`sum_parallel`] behind the task lifecycle. Only the root's data is read.
#[derive(Debug)]
pub struct VectorSumParallel<'c, C: Communicator, T: Reducible> {
    comm: &'c C,
    data: TaskData,
    input: Option<Vec<T>>,
    total: Option<T>,
    tracker: StageTracker,
}

impl<'c, C: Communicator, T: Reducible> VectorSumParallel<'c, C, T> {
    pub fn new(comm: &'c C, data: TaskData) -> Self {
        Self {
            comm,
            data,
            input: None,
            total: None,
            tracker: StageTracker::new("vector_sum_parallel"),
        }
    }

    pub fn data(&self) -> &TaskData {
        &self.data
    }
}

impl<C: Communicator, T: Reducible> Task for VectorSumParallel<'_, C, T> {
    fn name(&self) -> &'static str {
        "vector_sum_parallel"
    }

    fn stage(&self) -> Stage {
        self.tracker.stage()
    }

    fn validation(&mut self) -> bool {
        let verdict = self.comm.is_rank(ROOT).then(|| single_output(&self.data));
        match self.comm.broadcast(verdict, ROOT) {
            Ok(true) => {
                self.tracker.enter(Stage::Validated);
                true
            }
            Ok(false) => {
                log::debug!("{}: output must hold exactly one element", self.name());
                false
            }
            Err(e) => {
                log::warn!("{}: validation verdict lost: {}", self.name(), e);
                false
            }
        }
    }

    fn pre_processing(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::PreProcessed);
        if self.comm.is_rank(ROOT) {
            self.input = Some(self.data.stage_counted(0)?);
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::Run);
        self.total = sum_parallel(self.comm, self.input.as_deref())?;
        Ok(())
    }

    fn post_processing(&mut self) -> Result<(), TaskError> {
        self.tracker.enter(Stage::PostProcessed);
        if self.comm.is_rank(ROOT) {
            let total = self.total.ok_or(TaskError::NoResult(self.name()))?;
            self.data.write_output(0, &[total])?;
        }
        Ok(())
    }
}

fn single_output(data: &TaskData) -> bool {
    matches!(data.output_count(0), Ok(1))
}
