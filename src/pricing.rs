//! Dantzig pricing: selects the entering (primal) / leaving (dual)
//! candidate from the reduced-cost vector, with a per-iteration lock
//! list for candidates that prove numerically unstable in the ratio
//! test.
//!
//! Grounded on the pricing naming/shape used throughout
//! `original_source/src/simplex/pricing/` and spec §4.I. Logical
//! columns need no special-case indirection here: component E stores
//! them as explicit unit columns in [`SparseMatrix`](crate::matrix::SparseMatrix),
//! so `pi.dot_product(column)` already reduces to `pi[row]` for them.

use crate::I;
use crate::feasibility::FeasibilityClass;
use crate::matrix::SparseMatrix;
use crate::model::ComputationalModel;
use crate::simplex::VariableState;
use crate::tolerance::Tolerances;
use crate::vector::HybridVector;

/// `h = 1_M - 1_P` over the basic rows, the phase-I pricing direction.
pub fn phase1_direction(classes: &[FeasibilityClass], sparsity_ratio: f64) -> HybridVector {
    let mut h = HybridVector::zeros(classes.len(), sparsity_ratio);
    for (i, class) in classes.iter().enumerate() {
        match class {
            FeasibilityClass::Below => h.set(i, 1.0),
            FeasibilityClass::Above => h.set(i, -1.0),
            FeasibilityClass::Feasible => {}
        }
    }
    h
}

/// `c_B`, the cost of the basis head, the phase-II pricing direction.
pub fn phase2_direction(model: &ComputationalModel, head: &[I]) -> HybridVector {
    let mut cb = HybridVector::zeros(head.len(), model.matrix.sparsity_ratio());
    for (row, &var) in head.iter().enumerate() {
        let c = model.cost[var];
        if c != 0.0 {
            cb.set(row, c);
        }
    }
    cb
}

/// Reduced cost of nonbasic column `j`. Phase II (`cost = Some(c)`) is
/// `d_j = c_j - <pi, A_j>`; phase I has no cost row and prices
/// `d~_j = <pi, A_j>` directly (spec §4.I: `pi <- B^-T h`, `d~_j =
/// <pi, A_j>` -- there is no `c_j - ...` term to subtract from).
fn reduced_cost(matrix: &SparseMatrix, pi: &HybridVector, cost: Option<&[f64]>, j: I, tol: &Tolerances) -> f64 {
    let column = matrix.column(j);
    let dot = pi.dot_product(column, tol);
    match cost {
        Some(c) => c[j] - dot,
        None => dot,
    }
}

/// Dantzig pricing with a per-iteration candidate lock list, used to
/// skip columns that a prior ratio-test attempt this iteration found
/// numerically unstable. Carries a second, row-indexed lock list for the
/// dual variant's leaving-row selection, which plays the symmetric role
/// spec §4.I assigns pricing on the dual side ("choose ... outgoing dual").
#[derive(Debug, Clone)]
pub struct DantzigPricing {
    locked: Vec<bool>,
    last_selected: Option<I>,
    locked_rows: Vec<bool>,
    last_selected_row: Option<I>,
}

impl DantzigPricing {
    pub fn new(n_cols: I, n_rows: I) -> Self {
        DantzigPricing {
            locked: vec![false; n_cols],
            last_selected: None,
            locked_rows: vec![false; n_rows],
            last_selected_row: None,
        }
    }

    /// Lock the most recently returned candidate; it is skipped by
    /// subsequent `select_*` calls until `release_used`.
    pub fn lock_last_index(&mut self) {
        if let Some(j) = self.last_selected {
            self.locked[j] = true;
        }
    }

    /// Lock the most recently returned leaving row; it is skipped by
    /// subsequent `select_dual_leaving` calls until `release_used`.
    pub fn lock_last_row(&mut self) {
        if let Some(i) = self.last_selected_row {
            self.locked_rows[i] = true;
        }
    }

    /// Clear both lock lists at the start of a new iteration.
    pub fn release_used(&mut self) {
        self.locked.iter_mut().for_each(|l| *l = false);
        self.last_selected = None;
        self.locked_rows.iter_mut().for_each(|l| *l = false);
        self.last_selected_row = None;
    }

    pub fn is_locked(&self, j: I) -> bool {
        self.locked[j]
    }

    /// Dual pricing: the basic row with the largest primal infeasibility
    /// (Dantzig rule over the M/P partition), skipping locked rows. Returns
    /// the row and `leaving_sign` (+1 below its lower bound and wanting to
    /// increase, -1 above its upper bound and wanting to decrease), the
    /// convention `ratio_test::dual_ratio_test_phase1/2` expect.
    pub fn select_dual_leaving(
        &mut self,
        x_b: &[f64],
        lower: &[f64],
        upper: &[f64],
        classes: &[FeasibilityClass],
    ) -> Option<(I, f64)> {
        let mut best: Option<(I, f64, f64)> = None;
        for i in 0..x_b.len() {
            if self.locked_rows[i] {
                continue;
            }
            let (violation, sign) = match classes[i] {
                FeasibilityClass::Below => (lower[i] - x_b[i], 1.0),
                FeasibilityClass::Above => (x_b[i] - upper[i], -1.0),
                FeasibilityClass::Feasible => continue,
            };
            if best.map_or(true, |(_, best_v, _)| violation > best_v) {
                best = Some((i, violation, sign));
            }
        }
        self.last_selected_row = best.map(|(i, _, _)| i);
        best.map(|(i, _, sign)| (i, sign))
    }

    /// Phase-I selection: `pi <- B^-T h`, then Dantzig over `<pi, A_j>`.
    pub fn select_phase1(
        &mut self,
        model: &ComputationalModel,
        pi: &HybridVector,
        states: &[VariableState],
        tol: &Tolerances,
    ) -> Option<I> {
        self.select(model, pi, None, states, tol)
    }

    /// Phase-II selection: `pi <- B^-T c_B`, then Dantzig over
    /// `c_j - <pi, A_j>`.
    pub fn select_phase2(
        &mut self,
        model: &ComputationalModel,
        pi: &HybridVector,
        states: &[VariableState],
        tol: &Tolerances,
    ) -> Option<I> {
        self.select(model, pi, Some(&model.cost), states, tol)
    }

    fn select(
        &mut self,
        model: &ComputationalModel,
        pi: &HybridVector,
        cost: Option<&[f64]>,
        states: &[VariableState],
        tol: &Tolerances,
    ) -> Option<I> {
        let tau = tol.e_optimality;
        let mut best: Option<(I, f64)> = None;
        for j in 0..model.n_cols() {
            if self.locked[j] {
                continue;
            }
            let eligible = match states[j] {
                VariableState::Basic(_) | VariableState::NonbasicFixed => continue,
                VariableState::NonbasicAtLower => {
                    let d = reduced_cost(&model.matrix, pi, cost, j, tol);
                    (d < -tau).then_some(d)
                }
                VariableState::NonbasicAtUpper => {
                    let d = reduced_cost(&model.matrix, pi, cost, j, tol);
                    (d > tau).then_some(d)
                }
                VariableState::NonbasicFree => {
                    let d = reduced_cost(&model.matrix, pi, cost, j, tol);
                    (d.abs() > tau).then_some(d)
                }
            };
            if let Some(d) = eligible {
                if best.map_or(true, |(_, best_d)| d.abs() > best_d.abs()) {
                    best = Some((j, d));
                }
            }
        }
        self.last_selected = best.map(|(j, _)| j);
        self.last_selected
    }
}
