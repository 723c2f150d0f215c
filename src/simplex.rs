//! Simplex control loop: the state machine that drives pricing, the
//! ratio test, and the basis factorization through init -> reinvert ->
//! iterate -> terminate (spec §4.J).
//!
//! Grounded on `amadavan-copters/src/nlp/ipm/mod.rs`'s
//! `InteriorPointMethod::solve` (the `for iter in 0..max_iter { ...;
//! callback.call(); if let Some(status) = terminator.terminate() {
//! return Ok(status) } }` control shape, and the same `Result<Status,
//! Problem>` signature), adapted from a single Newton iterate to the
//! price/select/update phases below, and on
//! `original_source/src/simplex/simplex.cpp` for the bad-iteration /
//! degenerate-iteration bookkeeping rule.

use std::collections::HashMap;

use problemo::Problem;

use crate::I;
use crate::Status;
use crate::basis::{Basis, FactorizationKind, NontriangularMethod, Pfi};
use crate::basis::pfi::NontriangularPivotRule;
use crate::callback::{Callback, NoOpCallback};
use crate::error::SimplexError;
use crate::feasibility::{self, FeasibilityClass};
use crate::model::{ComputationalModel, VariableType};
use crate::pricing::{self, DantzigPricing};
use crate::ratio_test::{self, ExpandTolerance, SelectionMode};
use crate::terminators::Terminator;
use crate::tolerance::Tolerances;
use crate::vector::HybridVector;

/// One of the three partitions every variable index falls into, plus the
/// basic handle. Spec Design Notes §9 restates the source's aliased
/// "pointer into basic values" as an owned handle: a basic variable's
/// current value is read through `row`, not through a raw pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableState {
    NonbasicAtLower,
    NonbasicAtUpper,
    NonbasicFixed,
    NonbasicFree,
    Basic(I),
}

/// Which objective is currently driving the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    One,
    Two,
}

/// Which of the two revised-simplex variants (spec §1/§2 component H)
/// drives the control loop: primal (price the entering column, ratio-test
/// the leaving row) or dual (price the leaving row, ratio-test the
/// entering column via `ratio_test::dual_ratio_test_phase1/2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimplexMethod {
    #[default]
    Primal,
    Dual,
}

/// A parsed configuration value; the raw form the flat key -> scalar
/// table (spec §6) is given in before [`SimplexOptions::from_table`]
/// interprets it.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Int(i64),
    Float(f64),
    Str(String),
}

pub type OptionsTable = HashMap<String, OptionValue>;

fn selection_mode_from_code(code: i64) -> Result<SelectionMode, SimplexError> {
    match code {
        0 => Ok(SelectionMode::Dantzig),
        1 => Ok(SelectionMode::Piecewise),
        2 => Ok(SelectionMode::PiecewiseGuarded),
        _ => Err(SimplexError::InvalidConfiguration { key: "nonlinear_dual_phaseI/II_function".into() }),
    }
}

/// Engine configuration: every key of spec §6's table becomes a typed
/// field here, parsed once at construction rather than read as ambient
/// global state from the inner loop (spec Design Notes §9).
#[derive(Debug, Clone)]
pub struct SimplexOptions {
    pub tol: Tolerances,
    pub sparsity_ratio: f64,
    pub elbowroom: I,
    pub nontriangular_method: NontriangularMethod,
    pub nontriangular_pivot_rule: NontriangularPivotRule,
    pub reinversion_frequency: usize,
    pub phase1_ratio_mode: SelectionMode,
    pub phase2_ratio_mode: SelectionMode,
    pub expand_enabled: bool,
    pub expand_multiplier: f64,
    pub expand_divider: f64,
    pub iteration_limit: u64,
    pub time_limit_secs: Option<u64>,
    pub method: SimplexMethod,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        SimplexOptions {
            tol: Tolerances::default(),
            sparsity_ratio: 0.1,
            elbowroom: 8,
            nontriangular_method: NontriangularMethod::BlockOrderedTriangular,
            nontriangular_pivot_rule: NontriangularPivotRule::Threshold,
            reinversion_frequency: 30,
            phase1_ratio_mode: SelectionMode::Dantzig,
            phase2_ratio_mode: SelectionMode::Dantzig,
            expand_enabled: true,
            expand_multiplier: 2.0,
            expand_divider: 1.0e4,
            iteration_limit: 10_000,
            time_limit_secs: None,
            method: SimplexMethod::Primal,
        }
    }
}

impl SimplexOptions {
    /// Parse a flat key -> scalar table into a typed options record.
    /// Unknown keys are ignored (forward compatibility); a recognized key
    /// with the wrong value shape is `InvalidConfiguration`.
    pub fn from_table(table: &OptionsTable) -> Result<SimplexOptions, SimplexError> {
        let mut options = SimplexOptions::default();
        macro_rules! float_key {
            ($key:literal, $field:expr) => {
                if let Some(v) = table.get($key) {
                    $field = match v {
                        OptionValue::Float(f) => *f,
                        OptionValue::Int(i) => *i as f64,
                        OptionValue::Str(_) => {
                            return Err(SimplexError::InvalidConfiguration { key: $key.into() });
                        }
                    };
                }
            };
        }
        float_key!("e_pivot", options.tol.e_pivot);
        float_key!("e_feasibility", options.tol.e_feasibility);
        float_key!("e_optimality", options.tol.e_optimality);
        float_key!("e_absolute", options.tol.e_absolute);
        float_key!("e_relative", options.tol.e_relative);
        float_key!("pivot_threshold", options.tol.pivot_threshold);
        float_key!("sparsity_ratio", options.sparsity_ratio);
        float_key!("expand_multiplier_dphI", options.expand_multiplier);
        float_key!("expand_divider_dphI", options.expand_divider);

        if let Some(v) = table.get("elbowroom") {
            options.elbowroom = match v {
                OptionValue::Int(i) => *i as I,
                _ => return Err(SimplexError::InvalidConfiguration { key: "elbowroom".into() }),
            };
        }
        if let Some(v) = table.get("reinversion_frequency") {
            options.reinversion_frequency = match v {
                OptionValue::Int(i) => *i as usize,
                _ => return Err(SimplexError::InvalidConfiguration { key: "reinversion_frequency".into() }),
            };
        }
        if let Some(v) = table.get("nontriangular_method") {
            options.nontriangular_method = match v {
                OptionValue::Str(s) if s == "SEARCH" => NontriangularMethod::Search,
                OptionValue::Str(s) if s == "BLOCK_TRIANGULAR" => NontriangularMethod::BlockTriangular,
                OptionValue::Str(s) if s == "BLOCK_ORDERED_TRIANGULAR" => NontriangularMethod::BlockOrderedTriangular,
                _ => return Err(SimplexError::InvalidConfiguration { key: "nontriangular_method".into() }),
            };
        }
        if let Some(v) = table.get("nontriangular_pivot_rule") {
            options.nontriangular_pivot_rule = match v {
                OptionValue::Str(s) if s == "NONE" => NontriangularPivotRule::None,
                OptionValue::Str(s) if s == "THRESHOLD" => NontriangularPivotRule::Threshold,
                _ => return Err(SimplexError::InvalidConfiguration { key: "nontriangular_pivot_rule".into() }),
            };
        }
        if let Some(v) = table.get("nonlinear_dual_phaseI_function") {
            let code = match v {
                OptionValue::Int(i) => *i,
                _ => return Err(SimplexError::InvalidConfiguration { key: "nonlinear_dual_phaseI_function".into() }),
            };
            options.phase1_ratio_mode = selection_mode_from_code(code)?;
        }
        if let Some(v) = table.get("nonlinear_dual_phaseII_function") {
            let code = match v {
                OptionValue::Int(i) => *i,
                _ => return Err(SimplexError::InvalidConfiguration { key: "nonlinear_dual_phaseII_function".into() }),
            };
            options.phase2_ratio_mode = selection_mode_from_code(code)?;
        }
        if let Some(v) = table.get("expand_enabled") {
            options.expand_enabled = match v {
                OptionValue::Int(i) => *i != 0,
                _ => return Err(SimplexError::InvalidConfiguration { key: "expand_enabled".into() }),
            };
        }
        if let Some(v) = table.get("iteration_limit") {
            options.iteration_limit = match v {
                OptionValue::Int(i) => *i as u64,
                _ => return Err(SimplexError::InvalidConfiguration { key: "iteration_limit".into() }),
            };
        }
        if let Some(v) = table.get("time_limit") {
            options.time_limit_secs = Some(match v {
                OptionValue::Int(i) => *i as u64,
                OptionValue::Float(f) => *f as u64,
                _ => return Err(SimplexError::InvalidConfiguration { key: "time_limit".into() }),
            });
        }
        if let Some(v) = table.get("method") {
            options.method = match v {
                OptionValue::Str(s) if s == "PRIMAL" => SimplexMethod::Primal,
                OptionValue::Str(s) if s == "DUAL" => SimplexMethod::Dual,
                _ => return Err(SimplexError::InvalidConfiguration { key: "method".into() }),
            };
        }
        Ok(options)
    }
}

/// A read-only snapshot handed to the [`Callback`] once per iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationReport {
    pub iteration: I,
    pub phase: Phase,
    pub objective: f64,
    pub primal_infeasibility: f64,
    pub bad_iterations: I,
    pub degenerate_iterations: I,
}

/// Looks up the current value of variable `j`: the pinned bound value if
/// nonbasic, or `x_b[row]` if basic. Single function, no aliased pointer
/// (spec Design Notes §9).
fn variable_value(model: &ComputationalModel, states: &[VariableState], x_b: &[f64], j: I) -> f64 {
    match states[j] {
        VariableState::Basic(row) => x_b[row],
        VariableState::NonbasicAtLower => model.variables[j].lower,
        VariableState::NonbasicAtUpper => model.variables[j].upper,
        VariableState::NonbasicFixed => model.variables[j].lower,
        VariableState::NonbasicFree => 0.0,
    }
}

/// The revised-simplex engine: one instance per solve, owning the model,
/// the factored basis, the variable-state partition, and the engine's
/// scratch (scratch buffers live inside [`HybridVector`] operations and
/// the PFI factorization, per spec §5 -- nothing here is process-global).
pub struct SimplexSolver {
    model: ComputationalModel,
    options: SimplexOptions,
    basis: FactorizationKind,
    head: Vec<I>,
    states: Vec<VariableState>,
    x_b: Vec<f64>,
    pricing: DantzigPricing,
    expand: ExpandTolerance,
    phase: Phase,
    status: Status,
    nit: I,
    bad_iterations: I,
    degenerate_iterations: I,
    callback: Box<dyn Callback>,
    terminator: Box<dyn Terminator>,
}

impl SimplexSolver {
    /// Construct with the default no-op callback and a terminator built
    /// from `options.iteration_limit`/`options.time_limit_secs` (spec §6):
    /// `solve` raises `Status::IterationLimit`/`Status::TimeLimit` as soon
    /// as either cap is hit, without the caller wiring a terminator by hand.
    pub fn new(model: ComputationalModel, options: SimplexOptions) -> SimplexSolver {
        let mut terminators: Vec<Box<dyn Terminator>> =
            vec![Box::new(crate::terminators::IterationLimitTerminator::new(options.iteration_limit))];
        if let Some(secs) = options.time_limit_secs {
            terminators.push(Box::new(crate::terminators::TimeOutTerminator::new(secs)));
        }
        SimplexSolver::with_hooks(model, options, Box::new(NoOpCallback), Box::new(crate::terminators::MultipleTerminators::new(terminators)))
    }

    pub fn with_hooks(
        model: ComputationalModel,
        options: SimplexOptions,
        callback: Box<dyn Callback>,
        terminator: Box<dyn Terminator>,
    ) -> SimplexSolver {
        let m = model.n_rows();
        let n = model.n_cols();
        let mut states = Vec::with_capacity(n);
        for j in 0..model.n_structural {
            let var = &model.variables[j];
            let state = match var.var_type {
                VariableType::Free => VariableState::NonbasicFree,
                VariableType::Plus => VariableState::NonbasicAtLower,
                VariableType::Minus => VariableState::NonbasicAtUpper,
                VariableType::Fixed => VariableState::NonbasicFixed,
                VariableType::Bounded => {
                    if model.cost[j] >= 0.0 {
                        VariableState::NonbasicAtLower
                    } else {
                        VariableState::NonbasicAtUpper
                    }
                }
            };
            states.push(state);
        }
        let head: Vec<I> = (0..m).map(|i| model.n_structural + i).collect();
        for &row_var in &head {
            states.push(VariableState::Basic(head.iter().position(|&v| v == row_var).unwrap()));
        }
        let tol = options.tol;
        let expand = ExpandTolerance::new(tol.e_feasibility, options.expand_multiplier, options.expand_divider, options.expand_enabled);
        let pivot_rule = options.nontriangular_pivot_rule;
        let basis = FactorizationKind::Pfi(Pfi::new(options.nontriangular_method, pivot_rule, options.sparsity_ratio));
        SimplexSolver {
            model,
            options,
            basis,
            head,
            states,
            x_b: vec![0.0; m],
            pricing: DantzigPricing::new(n, m),
            expand,
            phase: Phase::One,
            status: Status::InProgress,
            nit: 0,
            bad_iterations: 0,
            degenerate_iterations: 0,
            callback,
            terminator,
        }
    }

    /// Construct from a warm-start basis head (spec §6), validated against
    /// `model` before any state is touched; an inconsistent basis raises
    /// [`SimplexError::BasisLoadError`] rather than silently falling back
    /// (spec §7 leaves the cold-start fallback to the caller).
    pub fn with_warm_start(
        model: ComputationalModel,
        options: SimplexOptions,
        basis: &crate::io::BasisHead,
    ) -> Result<SimplexSolver, SimplexError> {
        basis.validate(&model)?;
        let mut solver = SimplexSolver::new(model, options);
        for (row, &var) in basis.basic.iter().enumerate() {
            solver.head[row] = var;
            solver.states[var] = VariableState::Basic(row);
        }
        for &(var, pin) in &basis.nonbasic {
            solver.states[var] = match pin {
                crate::io::NonbasicPin::Lower => VariableState::NonbasicAtLower,
                crate::io::NonbasicPin::Upper => VariableState::NonbasicAtUpper,
                crate::io::NonbasicPin::Fixed => VariableState::NonbasicFixed,
                crate::io::NonbasicPin::Free => VariableState::NonbasicFree,
            };
        }
        Ok(solver)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn head(&self) -> &[I] {
        &self.head
    }

    pub fn variable_states(&self) -> &[VariableState] {
        &self.states
    }

    /// Primal solution: one value per variable (structural followed by
    /// logical), read through [`variable_value`].
    pub fn solution(&self) -> Vec<f64> {
        (0..self.model.n_cols()).map(|j| variable_value(&self.model, &self.states, &self.x_b, j)).collect()
    }

    /// Rows left unassigned at the last reinversion and filled with their
    /// logical variable instead (spec §4.F.1's singularity counter).
    pub fn singularity_count(&self) -> usize {
        self.basis.singularity_count()
    }

    /// Number of iterations since init whose objective moved against the
    /// optimization direction (spec §4.J's bad-iteration detection).
    pub fn bad_iterations(&self) -> I {
        self.bad_iterations
    }

    /// Number of iterations since init whose objective did not move at all.
    pub fn degenerate_iterations(&self) -> I {
        self.degenerate_iterations
    }

    pub fn objective_value(&self) -> f64 {
        let mut obj = self.model.cost_constant;
        for j in 0..self.model.n_cols() {
            let c = self.model.cost[j];
            if c != 0.0 {
                obj += c * variable_value(&self.model, &self.states, &self.x_b, j);
            }
        }
        obj
    }

    fn row_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let mut lower = Vec::with_capacity(self.head.len());
        let mut upper = Vec::with_capacity(self.head.len());
        for &var in &self.head {
            lower.push(self.model.variables[var].lower);
            upper.push(self.model.variables[var].upper);
        }
        (lower, upper)
    }

    /// Factor the basis from scratch, recompute `x_B`, and reset the
    /// pricing lock set (spec §4.J step 2).
    fn reinvert(&mut self) -> Result<(), SimplexError> {
        self.basis.invert(&self.model, &self.head, &self.options.tol)?;
        if self.basis.singularity_count() > 0 {
            return Err(SimplexError::SingularBasis { count: self.basis.singularity_count() });
        }

        let m = self.model.n_rows();
        let mut rhs = HybridVector::from_dense(&self.model.rhs, self.options.sparsity_ratio);
        for j in 0..self.model.n_cols() {
            if matches!(self.states[j], VariableState::Basic(_)) {
                continue;
            }
            let value = variable_value(&self.model, &self.states, &self.x_b, j);
            if value != 0.0 {
                rhs.add_vector(-value, self.model.matrix.column(j), &self.options.tol);
            }
        }
        self.basis.ftran(&mut rhs, &self.options.tol);
        self.x_b = (0..m).map(|i| rhs.at(i)).collect();
        self.pricing.release_used();
        Ok(())
    }

    /// One price -> select -> update step. Returns `Ok(true)` if a pivot
    /// was applied, `Ok(false)` if the loop just settled on a terminal
    /// status (optimal/infeasible/unbounded) with no pivot to apply.
    /// Dispatches on `options.method` to the primal or dual variant (spec
    /// §1/§2 component H names both as core requirements).
    fn iterate(&mut self) -> Result<bool, SimplexError> {
        match self.options.method {
            SimplexMethod::Primal => self.iterate_primal(),
            SimplexMethod::Dual => self.iterate_dual(),
        }
    }

    /// Primal variant: price the entering column (I), FTRAN it, ratio-test
    /// the leaving row (H.4), pivot.
    fn iterate_primal(&mut self) -> Result<bool, SimplexError> {
        self.expand.advance();

        let (lower, upper) = self.row_bounds();
        let report = feasibility::classify_basic_values(&self.x_b, &lower, &upper, &self.options.tol);
        self.phase = if report.phase1_objective > self.options.tol.e_feasibility { Phase::One } else { Phase::Two };

        let reference_objective = match self.phase {
            Phase::One => report.phase1_objective,
            Phase::Two => self.objective_value(),
        };

        loop {
            let entering = match self.phase {
                Phase::One => {
                    let pi = self.btran_phase1(&report.classes);
                    self.pricing.select_phase1(&self.model, &pi, &self.states, &self.options.tol)
                }
                Phase::Two => {
                    let pi = self.btran_phase2();
                    self.pricing.select_phase2(&self.model, &pi, &self.states, &self.options.tol)
                }
            };

            let Some(entering) = entering else {
                self.status = match self.phase {
                    Phase::One => Status::PrimalInfeasible,
                    Phase::Two => Status::Optimal,
                };
                return Ok(false);
            };

            let mut alpha = self.model.matrix.column(entering).clone();
            self.basis.ftran(&mut alpha, &self.options.tol);
            let alpha_dense: Vec<f64> = (0..self.head.len()).map(|i| alpha.at(i)).collect();

            let entering_width = self.model.variables[entering].upper - self.model.variables[entering].lower;
            let mode = match self.phase {
                Phase::One => self.options.phase1_ratio_mode,
                Phase::Two => self.options.phase2_ratio_mode,
            };
            let rt = ratio_test::primal_ratio_test(
                &alpha_dense,
                &self.x_b,
                &lower,
                &upper,
                entering_width,
                self.expand.working_tolerance(),
                mode,
            );

            let Some(pivot_row) = rt.outgoing_row else {
                self.status = match self.phase {
                    Phase::One => Status::NumericalFailure,
                    Phase::Two => Status::PrimalUnbounded,
                };
                return Ok(false);
            };

            if alpha_dense[pivot_row].abs() <= self.options.tol.e_pivot {
                self.pricing.lock_last_index();
                continue;
            }

            let leaving = self.head[pivot_row];
            let theta = rt.theta;
            let entering_value = variable_value(&self.model, &self.states, &self.x_b, entering);

            for i in 0..self.x_b.len() {
                let a = alpha_dense[i];
                if a != 0.0 {
                    self.x_b[i] = crate::tolerance::stable_add_abs(self.x_b[i], -theta * a, self.options.tol.e_absolute);
                }
            }
            self.x_b[pivot_row] = entering_value + theta;

            self.states[leaving] = rt.outgoing_state;
            self.states[entering] = VariableState::Basic(pivot_row);
            self.head[pivot_row] = entering;

            match self.basis.append(&alpha, pivot_row, entering, &self.options.tol) {
                Ok(()) => {}
                Err(_) => {
                    self.reinvert()?;
                    return Ok(true);
                }
            }

            let new_objective = match self.phase {
                Phase::One => {
                    let (l2, u2) = self.row_bounds();
                    feasibility::classify_basic_values(&self.x_b, &l2, &u2, &self.options.tol).phase1_objective
                }
                Phase::Two => self.objective_value(),
            };
            if (new_objective - reference_objective).abs() <= self.options.tol.e_optimality {
                self.degenerate_iterations += 1;
            } else {
                let regressed = match self.phase {
                    Phase::One => new_objective > reference_objective,
                    Phase::Two => new_objective < reference_objective,
                };
                if regressed {
                    self.bad_iterations += 1;
                }
            }

            if self.basis.update_count() >= self.options.reinversion_frequency {
                self.reinvert()?;
            }
            return Ok(true);
        }
    }

    /// Dual variant: price the leaving row (I, the "outgoing dual" side),
    /// BTRAN its unit row to get the pivot row, ratio-test the entering
    /// column over reduced costs with BFRT bound flips (H.3), pivot. Always
    /// resolves primal infeasibility (spec's dual phase I in the control
    /// loop's sense); once `x_B` is feasible the loop reports `Optimal`
    /// (the engine only runs the dual method against a dual-feasible
    /// starting basis, so feasibility and optimality coincide here).
    fn iterate_dual(&mut self) -> Result<bool, SimplexError> {
        self.expand.advance();

        let (lower, upper) = self.row_bounds();
        let report = feasibility::classify_basic_values(&self.x_b, &lower, &upper, &self.options.tol);

        if report.phase1_objective <= self.options.tol.e_feasibility {
            self.phase = Phase::Two;
            self.status = Status::Optimal;
            return Ok(false);
        }
        self.phase = Phase::One;
        let reference_objective = report.phase1_objective;

        loop {
            let Some((leaving_row, leaving_sign)) =
                self.pricing.select_dual_leaving(&self.x_b, &lower, &upper, &report.classes)
            else {
                self.status = Status::PrimalInfeasible;
                return Ok(false);
            };

            let mut rho = HybridVector::zeros(self.head.len(), self.options.sparsity_ratio);
            rho.set(leaving_row, 1.0);
            self.basis.btran(&mut rho, &self.options.tol);

            let n_cols = self.model.n_cols();
            let row: Vec<f64> =
                (0..n_cols).map(|j| rho.dot_product(self.model.matrix.column(j), &self.options.tol)).collect();

            let pi = self.btran_phase2();
            let d: Vec<f64> = (0..n_cols)
                .map(|j| self.model.cost[j] - pi.dot_product(self.model.matrix.column(j), &self.options.tol))
                .collect();
            let bounded: Vec<bool> = (0..n_cols)
                .map(|j| {
                    let v = &self.model.variables[j];
                    v.lower.is_finite() && v.upper.is_finite()
                })
                .collect();

            let rt = ratio_test::dual_ratio_test_phase2(
                &row,
                &d,
                &self.states,
                &bounded,
                leaving_sign,
                self.expand.working_tolerance(),
                self.options.phase2_ratio_mode,
            );

            let Some(entering) = rt.incoming else {
                self.status = Status::DualUnbounded;
                return Ok(false);
            };

            // Flips are candidates swept past before the walk stopped at
            // `entering`; the stopping breakpoint itself becomes the pivot,
            // not a flip, even when it is also a bounded column.
            for flip in rt.flips.iter().filter(|f| f.index != entering) {
                let var = &self.model.variables[flip.index];
                let width = var.upper - var.lower;
                let delta = if flip.to_upper { width } else { -width };
                let mut alpha_flip = self.model.matrix.column(flip.index).clone();
                self.basis.ftran(&mut alpha_flip, &self.options.tol);
                for i in 0..self.x_b.len() {
                    let a = alpha_flip.at(i);
                    if a != 0.0 {
                        self.x_b[i] = crate::tolerance::stable_add_abs(self.x_b[i], -delta * a, self.options.tol.e_absolute);
                    }
                }
                self.states[flip.index] =
                    if flip.to_upper { VariableState::NonbasicAtUpper } else { VariableState::NonbasicAtLower };
            }

            let mut alpha = self.model.matrix.column(entering).clone();
            self.basis.ftran(&mut alpha, &self.options.tol);
            let alpha_dense: Vec<f64> = (0..self.head.len()).map(|i| alpha.at(i)).collect();

            if alpha_dense[leaving_row].abs() <= self.options.tol.e_pivot {
                self.pricing.lock_last_row();
                continue;
            }

            let leaving = self.head[leaving_row];
            let bound_hit = match report.classes[leaving_row] {
                FeasibilityClass::Below => lower[leaving_row],
                FeasibilityClass::Above => upper[leaving_row],
                FeasibilityClass::Feasible => self.x_b[leaving_row],
            };
            let theta = (self.x_b[leaving_row] - bound_hit) / alpha_dense[leaving_row];
            let entering_value = variable_value(&self.model, &self.states, &self.x_b, entering);

            for i in 0..self.x_b.len() {
                let a = alpha_dense[i];
                if a != 0.0 {
                    self.x_b[i] = crate::tolerance::stable_add_abs(self.x_b[i], -theta * a, self.options.tol.e_absolute);
                }
            }
            self.x_b[leaving_row] = entering_value + theta;

            let leaving_state = match report.classes[leaving_row] {
                FeasibilityClass::Above => VariableState::NonbasicAtUpper,
                _ => VariableState::NonbasicAtLower,
            };
            self.states[leaving] = leaving_state;
            self.states[entering] = VariableState::Basic(leaving_row);
            self.head[leaving_row] = entering;

            match self.basis.append(&alpha, leaving_row, entering, &self.options.tol) {
                Ok(()) => {}
                Err(_) => {
                    self.reinvert()?;
                    return Ok(true);
                }
            }

            let (l2, u2) = self.row_bounds();
            let new_objective = feasibility::classify_basic_values(&self.x_b, &l2, &u2, &self.options.tol).phase1_objective;
            if (new_objective - reference_objective).abs() <= self.options.tol.e_optimality {
                self.degenerate_iterations += 1;
            } else if new_objective > reference_objective {
                self.bad_iterations += 1;
            }

            if self.basis.update_count() >= self.options.reinversion_frequency {
                self.reinvert()?;
            }
            return Ok(true);
        }
    }

    fn btran_phase1(&self, classes: &[FeasibilityClass]) -> HybridVector {
        let mut pi = pricing::phase1_direction(classes, self.options.sparsity_ratio);
        self.basis.btran(&mut pi, &self.options.tol);
        pi
    }

    fn btran_phase2(&self) -> HybridVector {
        let mut pi = pricing::phase2_direction(&self.model, &self.head);
        self.basis.btran(&mut pi, &self.options.tol);
        pi
    }

    fn report(&self) -> IterationReport {
        IterationReport {
            iteration: self.nit,
            phase: self.phase,
            objective: self.objective_value(),
            primal_infeasibility: {
                let (lower, upper) = self.row_bounds();
                feasibility::classify_basic_values(&self.x_b, &lower, &upper, &self.options.tol).phase1_objective
            },
            bad_iterations: self.bad_iterations,
            degenerate_iterations: self.degenerate_iterations,
        }
    }
}

impl crate::Solver for SimplexSolver {
    fn solve(&mut self) -> Result<Status, Problem> {
        self.terminator.initialize();
        self.reinvert()?;

        for iter in 0..self.options.iteration_limit {
            self.nit = iter as I;
            self.terminator.tick();
            self.iterate()?;

            if self.status.is_terminal() {
                return Ok(self.status);
            }

            let report = self.report();
            self.callback.call(&report);

            if let Some(status) = self.terminator.terminate() {
                self.status = status;
                return Ok(status);
            }
        }
        self.status = Status::IterationLimit;
        Ok(self.status)
    }
}
