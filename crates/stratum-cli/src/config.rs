//! TOML job files.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use stratum_core::gauss::DimensionLayout;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub system: SystemConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub bench: BenchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// The linear system to solve.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SystemConfig {
    /// Row-major augmented matrix given in full.
    Inline {
        rows: usize,
        cols: usize,
        values: Vec<f64>,
    },
    /// Identity system with right-hand side `1..=size`.
    Diagonal { size: usize },
    /// Deterministic diagonally dominant system.
    Dominant {
        size: usize,
        #[serde(default)]
        seed: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Sequential,
    Parallel,
    Both,
}

impl RunMode {
    pub fn sequential(self) -> bool {
        matches!(self, RunMode::Sequential | RunMode::Both)
    }

    pub fn parallel(self) -> bool {
        matches!(self, RunMode::Parallel | RunMode::Both)
    }
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_mode")]
    pub mode: RunMode,
    /// Where the dimensions travel in the task data.
    #[serde(default)]
    pub layout: DimensionLayout,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            mode: default_mode(),
            layout: DimensionLayout::default(),
        }
    }
}

fn default_workers() -> usize {
    4
}
fn default_mode() -> RunMode {
    RunMode::Both
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Pipeline,
    Task,
    Both,
}

#[derive(Debug, Deserialize)]
pub struct BenchConfig {
    #[serde(default = "default_num_running")]
    pub num_running: usize,
    #[serde(default = "default_measure")]
    pub measure: Measure,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            num_running: default_num_running(),
            measure: default_measure(),
        }
    }
}

fn default_num_running() -> usize {
    10
}
fn default_measure() -> Measure {
    Measure::Both
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to also write the report as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read job file {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid job file {}", path.display()))
}

pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    Ok(toml::from_str(content)?)
}
