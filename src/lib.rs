//! A revised-simplex linear programming engine: sparse vector kernel,
//! PFI basis factorization, ratio test, Dantzig pricing, and the
//! control loop that ties them together.
//!
//! ```ignore
//! use simplex_core::Solver;
//! use simplex_core::model::{ConstraintShape, ModelBuilder};
//! use simplex_core::simplex::{SimplexOptions, SimplexSolver};
//!
//! let mut builder = ModelBuilder::new();
//! let x = builder.structural_var("x", 1.0, 0.0, f64::INFINITY);
//! builder.constraint("c0", ConstraintShape::Geq, vec![(x, 1.0)], 1.0, 0.0);
//! let model = builder.build();
//!
//! let mut solver = SimplexSolver::new(model, SimplexOptions::default());
//! let status = solver.solve().unwrap();
//! ```

pub type E = f64;
pub type I = usize;

pub mod basis;
pub mod callback;
pub mod error;
pub mod feasibility;
pub mod interface;
pub mod io;
pub mod matrix;
pub mod model;
pub mod partition;
pub mod pricing;
pub mod ratio_test;
pub mod simplex;
pub mod terminators;
pub mod tolerance;
pub mod vector;

#[cfg(test)]
pub mod tests;

/// Terminal and in-progress states of a solve.
///
/// Mirrors the exit statuses of the external interface: every non-`InProgress`
/// variant is a possible return value of [`simplex::SimplexSolver::solve`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Status {
    #[default]
    InProgress,
    Optimal,
    PrimalInfeasible,
    DualInfeasible,
    PrimalUnbounded,
    DualUnbounded,
    IterationLimit,
    TimeLimit,
    NumericalFailure,
    Interrupted,
}

impl Status {
    /// Whether this status ends the solve (vs. `InProgress`).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::InProgress)
    }
}

/// Common interface for iterative solvers built on this crate's components.
pub trait Solver {
    /// Run the solver to completion (a terminal [`Status`]) or until an
    /// unrecoverable error is raised.
    fn solve(&mut self) -> Result<Status, problemo::Problem>;
}
