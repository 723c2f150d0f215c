//! Scenario-level tests exercising the control loop end-to-end, beyond the
//! per-module unit tests already colocated with each component. These are
//! the "concrete scenarios" of spec §8.

use crate::Solver;
use crate::Status;
use crate::model::{ConstraintShape, ModelBuilder};
use crate::simplex::{SimplexOptions, SimplexSolver};

/// A small LP whose optimum sits at a degenerate vertex (`x1 = 0` makes
/// both `c0` and `c1`'s logical variables simultaneously tight). Exercises
/// spec §8 scenario 4: EXPAND should never leave the loop worse off than
/// running with it disabled.
fn degenerate_lp() -> crate::model::ComputationalModel {
    let mut b = ModelBuilder::new();
    let x1 = b.structural_var("x1", -1.0, 0.0, f64::INFINITY);
    let x2 = b.structural_var("x2", -1.0, 0.0, f64::INFINITY);
    b.constraint("c0", ConstraintShape::Leq, vec![(x1, 1.0), (x2, 1.0)], 0.0, 0.0);
    b.constraint("c1", ConstraintShape::Leq, vec![(x1, 1.0)], 0.0, 0.0);
    b.build()
}

#[test]
fn degenerate_pivot_expand_never_worse_than_disabled() {
    let mut disabled = SimplexOptions::default();
    disabled.expand_enabled = false;
    let mut solver_disabled = SimplexSolver::new(degenerate_lp(), disabled);
    let status_disabled = solver_disabled.solve().unwrap();
    assert_eq!(status_disabled, Status::Optimal);

    let enabled = SimplexOptions { expand_enabled: true, ..SimplexOptions::default() };
    let mut solver_enabled = SimplexSolver::new(degenerate_lp(), enabled);
    let status_enabled = solver_enabled.solve().unwrap();
    assert_eq!(status_enabled, Status::Optimal);

    assert!(solver_enabled.degenerate_iterations() <= solver_disabled.degenerate_iterations() + 2);
}

/// The Hilbert(5) "sum" LP (spec §8 scenario 5): row `i` has coefficient
/// `1/(i+j+1)`, right-hand side equal to the row sum, so the unique
/// solution is `x_j = 1` for every `j`. A famously ill-conditioned but
/// small test of the block-triangular bump pivoting in the PFI
/// reinversion.
fn hilbert_sum_lp(n: usize) -> crate::model::ComputationalModel {
    let mut b = ModelBuilder::new();
    let xs: Vec<usize> = (0..n).map(|j| b.structural_var(format!("x{j}"), 0.0, 0.0, f64::INFINITY)).collect();
    for i in 0..n {
        let coeffs: Vec<(usize, f64)> = (0..n).map(|j| (xs[j], 1.0 / (i + j + 1) as f64)).collect();
        let row_sum: f64 = coeffs.iter().map(|&(_, v)| v).sum();
        b.constraint(format!("c{i}"), ConstraintShape::Eq, coeffs, 0.0, row_sum);
    }
    b.build()
}

#[test]
fn hilbert5_sum_lp_solves_to_all_ones() {
    let model = hilbert_sum_lp(5);
    let options = SimplexOptions {
        nontriangular_method: crate::basis::NontriangularMethod::BlockTriangular,
        ..SimplexOptions::default()
    };
    let mut solver = SimplexSolver::new(model, options);
    let status = solver.solve().unwrap();
    assert_eq!(status, Status::Optimal);
    assert_eq!(solver.singularity_count(), 0);

    let solution = solver.solution();
    for (j, &x) in solution.iter().take(5).enumerate() {
        assert!((x - 1.0).abs() < 1e-3, "x{j} = {x}, expected ~1.0");
    }
}

/// Round-trip a basis head through [`crate::io::BasisHead`]: loading the
/// exact head a solver already settled on must reproduce the same initial
/// `x_B` and reduced-cost partition (spec §8's basis-head round-trip
/// property).
#[test]
fn warm_start_from_solved_head_reproduces_basic_values() {
    let mut b = ModelBuilder::new();
    let x = b.structural_var("x", 1.0, 0.0, f64::INFINITY);
    b.constraint("c0", ConstraintShape::Geq, vec![(x, 1.0)], 1.0, 0.0);
    let model = b.build();

    let mut solved = SimplexSolver::new(model.clone(), SimplexOptions::default());
    solved.solve().unwrap();
    let head = solved.head().to_vec();
    let n_cols = model.n_cols();
    let basic_set: std::collections::HashSet<_> = head.iter().copied().collect();
    let nonbasic = (0..n_cols)
        .filter(|j| !basic_set.contains(j))
        .map(|j| (j, crate::io::NonbasicPin::Lower))
        .collect();
    let basis = crate::io::BasisHead { basic: head, nonbasic };

    let mut warm = SimplexSolver::with_warm_start(model, SimplexOptions::default(), &basis).unwrap();
    let warm_status = warm.solve().unwrap();
    assert_eq!(warm_status, Status::Optimal);
    assert!((warm.objective_value() - solved.objective_value()).abs() < 1e-9);
}
