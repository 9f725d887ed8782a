//! Timing real tasks with the perf harness.

use std::sync::atomic::{AtomicU64, Ordering};

use stratum_compute::{launch, Communicator};
use stratum_core::gauss::{DimensionLayout, ParallelGaussTask, SequentialGaussTask};
use stratum_core::perf::{Perf, PerfAttr, PerfError, RunKind};
use stratum_core::staging::TaskData;
use stratum_core::types::AugmentedMatrix;

fn system(n: usize) -> TaskData {
    let m = AugmentedMatrix::diagonally_dominant(n, 4);
    DimensionLayout::Counts.task_data(n, n + 1, &m.to_flat())
}

#[test]
fn sequential_pipeline_and_task_run() {
    let mut perf = Perf::new(SequentialGaussTask::new(system(40), DimensionLayout::Counts));
    let pipeline = perf.pipeline_run(&PerfAttr::with_runs(3)).unwrap();
    assert_eq!(pipeline.kind, RunKind::Pipeline);
    assert!(pipeline.time_sec >= 0.0);

    let task = perf.task_run(&PerfAttr::with_runs(4)).unwrap();
    assert_eq!(task.kind, RunKind::Task);
    assert_eq!(task.num_running, 4);
    assert!(task.phases.run >= 0.0);
    task.print_perf_statistic();
}

#[test]
fn injected_timer_is_used() {
    let ticks = AtomicU64::new(0);
    let attr = PerfAttr {
        num_running: 2,
        current_timer: Box::new(move || ticks.fetch_add(2, Ordering::SeqCst) as f64),
    };
    let mut perf = Perf::new(SequentialGaussTask::new(system(8), DimensionLayout::Counts));
    let results = perf.task_run(&attr).unwrap();
    assert_eq!(results.time_sec, 2.0);
    assert_eq!(results.phases.validation, 2.0);
}

#[test]
fn parallel_task_is_timed_on_every_worker() {
    let kinds = launch(3, |comm| {
        let data = if comm.rank() == 0 { system(30) } else { TaskData::default() };
        let mut perf = Perf::new(ParallelGaussTask::new(comm, data, DimensionLayout::Counts));
        let pipeline = perf.pipeline_run(&PerfAttr::with_runs(2)).unwrap().kind;
        let task = perf.task_run(&PerfAttr::with_runs(2)).unwrap().kind;
        (pipeline, task)
    })
    .unwrap();
    assert!(kinds.iter().all(|&k| k == (RunKind::Pipeline, RunKind::Task)));
}

#[test]
fn invalid_task_is_not_timed() {
    let data = DimensionLayout::Counts.task_data(2, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 6.0]);
    let mut perf = Perf::new(SequentialGaussTask::new(data, DimensionLayout::Counts));
    assert!(matches!(
        perf.pipeline_run(&PerfAttr::default()),
        Err(PerfError::ValidationFailed("gauss_sequential"))
    ));
}
