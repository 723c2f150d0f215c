//! Per-iteration callback hook: invoked once per control-loop iteration
//! with a read-only [`IterationReport`] snapshot, for logging, monitoring,
//! or early stopping.
//!
//! Grounded on `amadavan-copters/src/callback.rs`'s `Callback` trait
//! (`NoOpCallback`/`ConvergenceOutput`), adapted from the interior-point
//! `SolverState` snapshot to this engine's [`IterationReport`].

use crate::simplex::IterationReport;

/// Hook invoked once per solver iteration for logging, monitoring, or early stopping.
pub trait Callback {
    /// Called at the end of each iteration with the current solver state.
    fn call(&mut self, report: &IterationReport);
}

/// A callback that does nothing. Use when no per-iteration output is needed.
pub struct NoOpCallback;

impl Callback for NoOpCallback {
    fn call(&mut self, _report: &IterationReport) {}
}

/// Prints the phase, objective, and primal infeasibility to stdout each
/// iteration.
pub struct ConvergenceOutput;

impl Callback for ConvergenceOutput {
    fn call(&mut self, report: &IterationReport) {
        let phase = match report.phase {
            crate::simplex::Phase::One => "I",
            crate::simplex::Phase::Two => "II",
        };
        println!(
            "| {:4} | {:>4} | {:<12.6e} | {:<12.6e} | bad={:<4} deg={:<4} |",
            report.iteration,
            phase,
            report.objective,
            report.primal_infeasibility,
            report.bad_iterations,
            report.degenerate_iterations,
        );
    }
}
