//! Stratum command-line interface.
//!
//! Solve, validate and benchmark dense linear systems described in TOML job
//! files:
//! ```sh
//! stratum solve jobs/two_unknowns.toml -w 4
//! stratum validate jobs/dominant.toml
//! stratum bench jobs/dominant.toml -w 8
//! ```
//!
//! Set `RUST_LOG=debug` for per-phase logs, `RUST_LOG=info` for perf lines.

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stratum")]
#[command(about = "Stratum: row-cyclic parallel Gaussian elimination")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the system described by a job file.
    Solve {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of workers (overrides config file setting).
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Parse a job file and run the admission checks without solving.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Time the sequential and parallel tasks.
    Bench {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Number of workers (overrides config file setting).
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            config,
            output,
            workers,
        } => {
            println!("Stratum Gaussian Elimination");
            println!("============================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());
            let workers = workers.unwrap_or(job.run.workers);

            let report = runner::solve(&job, workers)?;
            println!("  {} unknowns, {} workers", report.rows, workers);
            for (i, x) in report.solution().iter().enumerate().take(10) {
                println!("  x[{}] = {:.10}", i, x);
            }
            if report.rows > 10 {
                println!("  ... ({} more)", report.rows - 10);
            }
            println!("  max residual: {:.3e}", report.residual);
            if let Some(diff) = report.max_difference {
                println!("  max |seq - par|: {:.3e}", diff);
            }

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            runner::write_solution_csv(&report, &out_dir.join("solution.csv"))?;
            if job.output.save_json {
                runner::write_json(&report, &out_dir.join("solution.json"))?;
            }

            println!("Solve complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let system = runner::validate(&job)?;
            println!(
                "Configuration is valid: {} ({}x{} augmented system)",
                config.display(),
                system.rows,
                system.cols
            );
            Ok(())
        }
        Commands::Bench { config, workers } => {
            let job = config::load_config(&config)?;
            let workers = workers.unwrap_or(job.run.workers);
            let results = runner::bench(&job, workers)?;

            println!("{:<18} {:<10} {:>6} {:>14}", "task", "mode", "runs", "time_sec");
            for r in &results {
                println!(
                    "{:<18} {:<10} {:>6} {:>14.6e}",
                    r.task,
                    r.kind.to_string(),
                    r.num_running,
                    r.time_sec
                );
            }

            if job.output.save_json {
                let path = PathBuf::from(&job.output.directory).join("bench.json");
                runner::write_json(results.as_slice(), &path)?;
            }
            Ok(())
        }
    }
}
