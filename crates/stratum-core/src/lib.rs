//! # Stratum Core
//!
//! Numerical kernels that run on top of [`stratum_compute`]. Every kernel
//! comes as a sequential/parallel pair behind the same [`task::Task`]
//! lifecycle, so the two can be checked against each other and timed with
//! the same harness.
//!
//! ## Architecture
//!
//! Callers hand a task a [`staging::TaskData`] of raw byte buffers. The task
//! validates the buffers, stages them into typed values, computes, and writes
//! its result back into output buffer 0. Parallel tasks take a cluster
//! context by reference; only the root rank reads and writes the buffers.
//!
//! ## Modules
//!
//! - [`types`]: augmented matrices and system generators.
//! - [`staging`]: raw buffers in, typed vectors out.
//! - [`task`]: the four-phase lifecycle.
//! - [`gauss`]: Gaussian elimination (row-cyclic parallel and sequential).
//! - [`sum`]: vector-sum reduction.
//! - [`perf`]: pipeline and task-run timing.
//! - [`verify`]: residuals and solution comparison.

pub mod gauss;
pub mod perf;
pub mod staging;
pub mod sum;
pub mod task;
pub mod types;
pub mod verify;
