//! Performance harness for [`Task`] implementations.
//!
//! Two measurement modes:
//!
//! | Mode | What repeats | `time_sec` |
//! |------|--------------|------------|
//! | [`Perf::pipeline_run`] | all four phases, `num_running` times | mean of one full pipeline |
//! | [`Perf::task_run`] | `run` only; the other phases execute once | mean of one `run` |
//!
//! The clock is injected through [`PerfAttr::current_timer`] so tests can use
//! a deterministic one. Parallel tasks are measured by running one `Perf` per
//! worker; every worker then walks the same collective sequence.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::task::{Task, TaskError};

/// Errors from a perf run.
#[derive(Debug, Error)]
pub enum PerfError {
    #[error("num_running must be at least 1")]
    NoRepetitions,

    #[error("Task `{0}` failed validation")]
    ValidationFailed(&'static str),

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Measurement settings.
pub struct PerfAttr {
    pub num_running: usize,
    /// Seconds since an arbitrary fixed origin.
    pub current_timer: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl Default for PerfAttr {
    fn default() -> Self {
        let origin = Instant::now();
        Self {
            num_running: 10,
            current_timer: Box::new(move || origin.elapsed().as_secs_f64()),
        }
    }
}

impl PerfAttr {
    pub fn with_runs(num_running: usize) -> Self {
        Self {
            num_running,
            ..Self::default()
        }
    }
}

impl fmt::Debug for PerfAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerfAttr")
            .field("num_running", &self.num_running)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Pipeline,
    Task,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Pipeline => write!(f, "pipeline"),
            RunKind::Task => write!(f, "task_run"),
        }
    }
}

/// Mean seconds spent in each phase per execution of that phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseTimes {
    pub validation: f64,
    pub pre_processing: f64,
    pub run: f64,
    pub post_processing: f64,
}

impl PhaseTimes {
    pub fn total(&self) -> f64 {
        self.validation + self.pre_processing + self.run + self.post_processing
    }
}

/// Outcome of one measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerfResults {
    pub task: String,
    pub kind: RunKind,
    pub num_running: usize,
    pub time_sec: f64,
    pub phases: PhaseTimes,
}

impl PerfResults {
    /// Log the result as `task:mode:seconds`.
    pub fn print_perf_statistic(&self) {
        log::info!("{}:{}:{:.10}", self.task, self.kind, self.time_sec);
        log::debug!(
            "{}: validation {:.3e}s, pre_processing {:.3e}s, run {:.3e}s, post_processing {:.3e}s",
            self.task,
            self.phases.validation,
            self.phases.pre_processing,
            self.phases.run,
            self.phases.post_processing
        );
    }
}

/// Wraps a task and measures it.
#[derive(Debug)]
pub struct Perf<T: Task> {
    task: T,
}

impl<T: Task> Perf<T> {
    pub fn new(task: T) -> Self {
        Self { task }
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn into_inner(self) -> T {
        self.task
    }

    /// Run the full pipeline `num_running` times.
    pub fn pipeline_run(&mut self, attr: &PerfAttr) -> Result<PerfResults, PerfError> {
        let n = repetitions(attr)?;
        let timer = attr.current_timer.as_ref();
        let mut phases = PhaseTimes::default();

        for _ in 0..n {
            let (valid, t) = timed(timer, || self.task.validation());
            phases.validation += t;
            if !valid {
                return Err(PerfError::ValidationFailed(self.task.name()));
            }
            phases.pre_processing += timed_phase(timer, || self.task.pre_processing())?;
            phases.run += timed_phase(timer, || self.task.run())?;
            phases.post_processing += timed_phase(timer, || self.task.post_processing())?;
        }

        let phases = PhaseTimes {
            validation: phases.validation / n as f64,
            pre_processing: phases.pre_processing / n as f64,
            run: phases.run / n as f64,
            post_processing: phases.post_processing / n as f64,
        };
        Ok(PerfResults {
            task: self.task.name().to_string(),
            kind: RunKind::Pipeline,
            num_running: n,
            time_sec: phases.total(),
            phases,
        })
    }

    /// Prepare once, time `run` `num_running` times, publish once.
    pub fn task_run(&mut self, attr: &PerfAttr) -> Result<PerfResults, PerfError> {
        let n = repetitions(attr)?;
        let timer = attr.current_timer.as_ref();

        let (valid, validation) = timed(timer, || self.task.validation());
        if !valid {
            return Err(PerfError::ValidationFailed(self.task.name()));
        }
        let pre_processing = timed_phase(timer, || self.task.pre_processing())?;

        let mut run = 0.0;
        for _ in 0..n {
            run += timed_phase(timer, || self.task.run())?;
        }
        let run = run / n as f64;

        let post_processing = timed_phase(timer, || self.task.post_processing())?;

        Ok(PerfResults {
            task: self.task.name().to_string(),
            kind: RunKind::Task,
            num_running: n,
            time_sec: run,
            phases: PhaseTimes {
                validation,
                pre_processing,
                run,
                post_processing,
            },
        })
    }
}

fn repetitions(attr: &PerfAttr) -> Result<usize, PerfError> {
    match attr.num_running {
        0 => Err(PerfError::NoRepetitions),
        n => Ok(n),
    }
}

fn timed_phase(
    timer: &dyn Fn() -> f64,
    phase: impl FnOnce() -> Result<(), TaskError>,
) -> Result<f64, TaskError> {
    let (outcome, elapsed) = timed(timer, phase);
    outcome.map(|()| elapsed)
}

fn timed<R>(timer: &dyn Fn() -> f64, f: impl FnOnce() -> R) -> (R, f64) {
    let start = timer();
    let out = f();
    (out, timer() - start)
}
