//! Job runner: builds the system, drives the tasks and writes results.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use stratum_compute::{launch, Communicator};
use stratum_core::gauss::admission::admit;
use stratum_core::gauss::{DimensionLayout, ParallelGaussTask, SequentialGaussTask};
use stratum_core::perf::{Perf, PerfAttr, PerfError, PerfResults};
use stratum_core::staging::TaskData;
use stratum_core::task::Task;
use stratum_core::types::AugmentedMatrix;
use stratum_core::verify::{max_abs_diff, max_residual, TOLERANCE};

use crate::config::{JobConfig, Measure, SystemConfig};

/// A system in raw task form.
pub struct System {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
}

impl System {
    fn task_data(&self, layout: DimensionLayout) -> TaskData {
        layout.task_data(self.rows, self.cols, &self.values)
    }
}

/// Results of a solve.
#[derive(Debug, Serialize)]
pub struct SolveReport {
    pub rows: usize,
    pub workers: usize,
    pub sequential: Option<Vec<f64>>,
    pub parallel: Option<Vec<f64>>,
    pub residual: f64,
    pub max_difference: Option<f64>,
}

impl SolveReport {
    /// The solution to publish: parallel when available.
    pub fn solution(&self) -> &[f64] {
        self.parallel
            .as_deref()
            .or(self.sequential.as_deref())
            .unwrap_or(&[])
    }
}

pub fn build_system(config: &SystemConfig) -> System {
    match config {
        SystemConfig::Inline { rows, cols, values } => System {
            rows: *rows,
            cols: *cols,
            values: values.clone(),
        },
        SystemConfig::Diagonal { size } => from_matrix(AugmentedMatrix::identity_system(*size)),
        SystemConfig::Dominant { size, seed } => {
            from_matrix(AugmentedMatrix::diagonally_dominant(*size, *seed))
        }
    }
}

fn from_matrix(matrix: AugmentedMatrix) -> System {
    System {
        rows: matrix.rows(),
        cols: matrix.cols(),
        values: matrix.to_flat(),
    }
}

/// Run the admission checks on the job's system.
pub fn validate(job: &JobConfig) -> Result<System> {
    let system = build_system(&job.system);
    admit(&system.task_data(job.run.layout), job.run.layout)
        .context("System rejected by admission checks")?;
    Ok(system)
}

/// Solve the job's system in the configured mode(s).
pub fn solve(job: &JobConfig, workers: usize) -> Result<SolveReport> {
    let system = validate(job)?;
    let layout = job.run.layout;
    let matrix = AugmentedMatrix::from_flat(system.rows, system.cols, system.values.clone())?;

    let sequential = if job.run.mode.sequential() {
        Some(run_sequential(&system, layout)?)
    } else {
        None
    };
    let parallel = if job.run.mode.parallel() {
        Some(run_parallel(&system, layout, workers)?)
    } else {
        None
    };

    let max_difference = match (&sequential, &parallel) {
        (Some(s), Some(p)) => Some(max_abs_diff(s, p)),
        _ => None,
    };
    if let Some(diff) = max_difference {
        if diff.is_nan() || diff >= TOLERANCE {
            log::warn!("sequential and parallel solutions differ by {:.3e}", diff);
        }
    }

    let mut report = SolveReport {
        rows: system.rows,
        workers,
        sequential,
        parallel,
        residual: 0.0,
        max_difference,
    };
    report.residual = max_residual(&matrix, report.solution());
    Ok(report)
}

fn run_sequential(system: &System, layout: DimensionLayout) -> Result<Vec<f64>> {
    let mut task = SequentialGaussTask::new(system.task_data(layout), layout);
    if !task.validation() {
        bail!("Sequential task rejected its input");
    }
    task.pre_processing()?;
    task.run()?;
    task.post_processing()?;
    Ok(task.data().read_output(0)?)
}

fn run_parallel(system: &System, layout: DimensionLayout, workers: usize) -> Result<Vec<f64>> {
    let per_rank = launch(workers, |comm| -> Result<Option<Vec<f64>>> {
        let data = if comm.rank() == 0 {
            system.task_data(layout)
        } else {
            TaskData::default()
        };
        let mut task = ParallelGaussTask::new(comm, data, layout);
        if !task.validation() {
            bail!("Parallel task rejected its input on rank {}", comm.rank());
        }
        task.pre_processing()?;
        task.run()?;
        task.post_processing()?;
        if task.is_root() {
            Ok(Some(task.data().read_output(0)?))
        } else {
            Ok(None)
        }
    })?;

    let mut solution = None;
    for result in per_rank {
        if let Some(x) = result? {
            solution = Some(x);
        }
    }
    solution.context("Root worker returned no solution")
}

/// Time the sequential and/or parallel task in the configured mode(s).
pub fn bench(job: &JobConfig, workers: usize) -> Result<Vec<PerfResults>> {
    let system = validate(job)?;
    let layout = job.run.layout;
    let num_running = job.bench.num_running;
    let mut results = Vec::new();

    let measures: &[Measure] = match job.bench.measure {
        Measure::Pipeline => &[Measure::Pipeline],
        Measure::Task => &[Measure::Task],
        Measure::Both => &[Measure::Pipeline, Measure::Task],
    };

    for &measure in measures {
        if job.run.mode.sequential() {
            let task = SequentialGaussTask::new(system.task_data(layout), layout);
            results.push(measure_task(Perf::new(task), measure, num_running)?);
        }
        if job.run.mode.parallel() {
            let per_rank = launch(workers, |comm| {
                let data = if comm.rank() == 0 {
                    system.task_data(layout)
                } else {
                    TaskData::default()
                };
                let perf = Perf::new(ParallelGaussTask::new(comm, data, layout));
                measure_task(perf, measure, num_running)
            })?;
            let mut per_rank = per_rank.into_iter();
            let root = per_rank.next().context("Empty cluster")??;
            for other in per_rank {
                other?;
            }
            results.push(root);
        }
    }

    for result in &results {
        result.print_perf_statistic();
    }
    Ok(results)
}

fn measure_task<T: Task>(mut perf: Perf<T>, measure: Measure, num_running: usize) -> Result<PerfResults, PerfError> {
    let attr = PerfAttr::with_runs(num_running);
    match measure {
        Measure::Task => perf.task_run(&attr),
        Measure::Pipeline | Measure::Both => perf.pipeline_run(&attr),
    }
}

/// Write a solution vector to a CSV file with a metadata header.
pub fn write_solution_csv(report: &SolveReport, path: &Path) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Cannot create {}", path.display()))?;
    writeln!(file, "# Stratum Gaussian elimination")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# rows: {}, workers: {}", report.rows, report.workers)?;
    writeln!(file, "# max residual: {:.6e}", report.residual)?;
    writeln!(file, "#")?;
    writeln!(file, "index,x")?;
    for (i, x) in report.solution().iter().enumerate() {
        writeln!(file, "{},{:.12e}", i, x)?;
    }

    println!("Solution written to: {}", path.display());
    Ok(())
}

/// Write any serialisable report to a pretty-printed JSON file.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("JSON written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn job(toml: &str) -> JobConfig {
        parse_config(toml).unwrap()
    }

    #[test]
    fn test_solve_inline_system() {
        let job = job(
            r#"
            [system]
            kind = "inline"
            rows = 3
            cols = 4
            values = [3.0, 2.0, -5.0, -1.0, 2.0, -1.0, 3.0, 13.0, 1.0, 2.0, -1.0, 9.0]
            "#,
        );
        let report = solve(&job, 2).unwrap();
        assert!(report.residual < TOLERANCE);
        assert!(report.max_difference.unwrap() < TOLERANCE);
        let x = report.solution();
        assert!((x[0] - 3.0).abs() < TOLERANCE);
        assert!((x[1] - 5.0).abs() < TOLERANCE);
        assert!((x[2] - 4.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_singular_system_is_refused() {
        let job = job(
            r#"
            [system]
            kind = "inline"
            rows = 2
            cols = 3
            values = [1.0, 2.0, 3.0, 2.0, 4.0, 6.0]
            "#,
        );
        assert!(validate(&job).is_err());
        assert!(solve(&job, 2).is_err());
    }

    #[test]
    fn test_bench_reports_each_measure() {
        let job = job(
            r#"
            [system]
            kind = "diagonal"
            size = 12

            [bench]
            num_running = 2
            "#,
        );
        let results = bench(&job, 3).unwrap();
        // Two measures, sequential and parallel each.
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_written_files() {
        let job = job(
            r#"
            [system]
            kind = "dominant"
            size = 6
            seed = 2

            [run]
            mode = "sequential"
            "#,
        );
        let report = solve(&job, 1).unwrap();
        assert!(report.parallel.is_none());

        let dir = std::env::temp_dir().join(format!("stratum-cli-test-{}", std::process::id()));
        let csv = dir.join("solution.csv");
        let json = dir.join("solution.json");
        write_solution_csv(&report, &csv).unwrap();
        write_json(&report, &json).unwrap();
        let text = std::fs::read_to_string(&csv).unwrap();
        assert_eq!(text.lines().filter(|l| !l.starts_with('#')).count(), 7);
        let parsed: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(parsed["rows"], 6);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
