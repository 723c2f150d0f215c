//! Feasibility checker: classifies basic variable values and nonbasic
//! reduced costs into M (below bound) / F (feasible) / P (above bound),
//! and aggregates the phase-I objective from that partition.

use crate::I;
use crate::simplex::VariableState;
use crate::tolerance::Tolerances;

/// One of the three feasibility classes a basic value or a reduced cost
/// can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeasibilityClass {
    /// Below its lower bound (value) or wrong-signed at LB (reduced cost).
    Below,
    /// Within bound / correctly signed.
    Feasible,
    /// Above its upper bound (value) or wrong-signed at UB (reduced cost).
    Above,
}

/// Classify a basic variable's value against its bounds using the working
/// tolerance `tau`.
pub fn classify_value(value: f64, lower: f64, upper: f64, tau: f64) -> FeasibilityClass {
    if value < lower - tau {
        FeasibilityClass::Below
    } else if value > upper + tau {
        FeasibilityClass::Above
    } else {
        FeasibilityClass::Feasible
    }
}

/// Classify a nonbasic reduced cost against the sign its variable state
/// requires for dual feasibility.
pub fn classify_reduced_cost(d: f64, state: VariableState, tau: f64) -> FeasibilityClass {
    match state {
        VariableState::NonbasicAtLower => {
            if d < -tau { FeasibilityClass::Below } else { FeasibilityClass::Feasible }
        }
        VariableState::NonbasicAtUpper => {
            if d > tau { FeasibilityClass::Above } else { FeasibilityClass::Feasible }
        }
        VariableState::NonbasicFixed => FeasibilityClass::Feasible,
        VariableState::NonbasicFree => {
            if d > tau {
                FeasibilityClass::Above
            } else if d < -tau {
                FeasibilityClass::Below
            } else {
                FeasibilityClass::Feasible
            }
        }
        VariableState::Basic(_) => FeasibilityClass::Feasible,
    }
}

/// Per-row feasibility classes for the current basic values, plus the
/// phase-I (L1 infeasibility) objective.
#[derive(Debug, Clone)]
pub struct FeasibilityReport {
    pub classes: Vec<FeasibilityClass>,
    pub phase1_objective: f64,
}

/// Classify every basic value in `basic_values` against `lower`/`upper`
/// (indexed by basis row), and sum `sum_{M}(l - x) + sum_{P}(x - u)`.
pub fn classify_basic_values(
    basic_values: &[f64],
    lower: &[f64],
    upper: &[f64],
    tol: &Tolerances,
) -> FeasibilityReport {
    let mut classes = Vec::with_capacity(basic_values.len());
    let mut phase1_objective = 0.0;
    for i in 0..basic_values.len() {
        let class = classify_value(basic_values[i], lower[i], upper[i], tol.e_feasibility);
        match class {
            FeasibilityClass::Below => phase1_objective += lower[i] - basic_values[i],
            FeasibilityClass::Above => phase1_objective += basic_values[i] - upper[i],
            FeasibilityClass::Feasible => {}
        }
        classes.push(class);
    }
    FeasibilityReport { classes, phase1_objective }
}

/// Rows (basis positions) currently in M or P, i.e. in need of correction
/// before the switch from phase I to phase II.
pub fn infeasible_rows(report: &FeasibilityReport) -> Vec<I> {
    report
        .classes
        .iter()
        .enumerate()
        .filter(|&(_, c)| *c != FeasibilityClass::Feasible)
        .map(|(i, _)| i)
        .collect()
}
