//! Canonicalized LP model: the data the simplex engine actually consumes.
//!
//! Grounded on `LinearProgram`'s index layout (structural columns, then one
//! logical column per row) and its `impl From<mps::model::Model<f32>>`
//! conversion: logical/slack columns are appended with bounds and sign
//! derived from the constraint shape, exactly the recipe `build` below
//! implements directly rather than through an MPS intermediate.

use crate::I;
use crate::matrix::SparseMatrix;

/// A structural or logical variable's pure-function type: a function of
/// (finiteness of lower bound, finiteness of upper bound, whether they're
/// equal). Immutable after the model is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    /// Neither bound is finite.
    Free,
    /// Lower bound finite, upper infinite.
    Plus,
    /// Upper bound finite, lower infinite.
    Minus,
    /// Both bounds finite and distinct.
    Bounded,
    /// Lower bound equals upper bound.
    Fixed,
}

impl VariableType {
    pub fn classify(lower: f64, upper: f64) -> VariableType {
        let lo_finite = lower.is_finite();
        let hi_finite = upper.is_finite();
        match (lo_finite, hi_finite) {
            (false, false) => VariableType::Free,
            (true, false) => VariableType::Plus,
            (false, true) => VariableType::Minus,
            (true, true) if lower == upper => VariableType::Fixed,
            (true, true) => VariableType::Bounded,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub var_type: VariableType,
    pub lower: f64,
    pub upper: f64,
}

impl Variable {
    pub fn new(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Variable { name: name.into(), var_type: VariableType::classify(lower, upper), lower, upper }
    }
}

/// The shape of a user-supplied constraint, before it is converted into a
/// logical variable at canonicalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintShape {
    Leq,
    Geq,
    Eq,
    Range,
    NonBinding,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub shape: ConstraintShape,
    /// For Leq/Eq/Range: the upper/equality bound. For Geq: unused (lower
    /// bound carries the value). For NonBinding: unused.
    pub bound_upper: f64,
    /// Only meaningful for Range and Geq.
    pub bound_lower: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

/// The canonical form the engine operates on: `optimize cᵀx + c0` subject
/// to `Ax = b`, `l <= x <= u`, where columns `n..n+m` are a signed identity
/// (the logical variables) and constraints no longer exist as a distinct
/// concept.
#[derive(Debug, Clone)]
pub struct ComputationalModel {
    pub matrix: SparseMatrix,
    pub rhs: Vec<f64>,
    pub cost: Vec<f64>,
    pub cost_constant: f64,
    pub variables: Vec<Variable>,
    pub objective_sense: ObjectiveSense,
    /// Number of structural (user-supplied) columns; columns
    /// `n_structural..n_structural+n_rows` are logical.
    pub n_structural: I,
}

impl ComputationalModel {
    pub fn n_rows(&self) -> I {
        self.rhs.len()
    }

    pub fn n_cols(&self) -> I {
        self.variables.len()
    }

    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }
}

/// Accumulates structural variables and constraints, then canonicalizes
/// them into a [`ComputationalModel`] via [`ModelBuilder::build`].
#[derive(Default)]
pub struct ModelBuilder {
    structural: Vec<Variable>,
    structural_cost: Vec<f64>,
    constraints: Vec<Constraint>,
    /// One coefficient list per constraint, as (structural column, value).
    rows: Vec<Vec<(I, f64)>>,
    cost_constant: f64,
    objective_sense: ObjectiveSense,
    sparsity_ratio: f64,
}

impl ModelBuilder {
    pub fn new() -> Self {
        ModelBuilder {
            objective_sense: ObjectiveSense::Minimize,
            sparsity_ratio: 0.1,
            ..Default::default()
        }
    }

    pub fn objective_sense(mut self, sense: ObjectiveSense) -> Self {
        self.objective_sense = sense;
        self
    }

    pub fn cost_constant(mut self, c0: f64) -> Self {
        self.cost_constant = c0;
        self
    }

    pub fn sparsity_ratio(mut self, ratio: f64) -> Self {
        self.sparsity_ratio = ratio;
        self
    }

    /// Add a structural variable with the given objective coefficient and
    /// bounds; returns its column index.
    pub fn structural_var(&mut self, name: impl Into<String>, cost: f64, lower: f64, upper: f64) -> I {
        self.structural.push(Variable::new(name, lower, upper));
        self.structural_cost.push(cost);
        self.structural.len() - 1
    }

    /// Add a constraint over structural columns (`(column, coefficient)`
    /// pairs). `bound_upper`/`bound_lower` are interpreted per `shape`:
    /// Leq/Eq use `bound_upper`; Geq uses `bound_lower`; Range uses both;
    /// NonBinding uses neither.
    pub fn constraint(
        &mut self,
        name: impl Into<String>,
        shape: ConstraintShape,
        coefficients: Vec<(I, f64)>,
        bound_lower: f64,
        bound_upper: f64,
    ) -> I {
        self.constraints.push(Constraint { name: name.into(), shape, bound_upper, bound_lower });
        self.rows.push(coefficients);
        self.constraints.len() - 1
    }

    /// Canonicalize: append one logical variable per constraint (§4.E):
    ///
    /// 1. Column `n + i` is a unit vector in row `i`, with bounds derived
    ///    from the constraint shape (`Leq` -> `[0, inf)`; `Geq` ->
    ///    `(-inf, 0]`; `Range` -> `[0, upper - lower]`; `Eq` -> `[0, 0]`;
    ///    `NonBinding` -> `(-inf, inf)`).
    /// 2. `b_i` is taken from whichever bound side exists (upper for
    ///    Leq/Range/Eq, lower for Geq, 0 for NonBinding).
    pub fn build(self) -> ComputationalModel {
        let m = self.constraints.len();
        let n = self.structural.len();
        let mut variables = self.structural;
        let mut cost = self.structural_cost;
        let mut rhs = vec![0.0; m];
        let mut triplets: Vec<(I, I, f64)> = Vec::new();

        for (row, coeffs) in self.rows.iter().enumerate() {
            for &(col, val) in coeffs {
                triplets.push((row, col, val));
            }
        }

        for (i, constraint) in self.constraints.iter().enumerate() {
            let (lower, upper, b) = match constraint.shape {
                ConstraintShape::Leq => (0.0, f64::INFINITY, constraint.bound_upper),
                ConstraintShape::Geq => (f64::NEG_INFINITY, 0.0, constraint.bound_lower),
                ConstraintShape::Range => {
                    (0.0, constraint.bound_upper - constraint.bound_lower, constraint.bound_upper)
                }
                ConstraintShape::Eq => (0.0, 0.0, constraint.bound_upper),
                ConstraintShape::NonBinding => (f64::NEG_INFINITY, f64::INFINITY, 0.0),
            };
            let logical_col = n + i;
            variables.push(Variable::new(format!("{}_slack", constraint.name), lower, upper));
            cost.push(0.0);
            rhs[i] = b;
            triplets.push((i, logical_col, 1.0));
        }

        let matrix = SparseMatrix::from_triplets(m, n + m, &triplets, self.sparsity_ratio);

        ComputationalModel {
            matrix,
            rhs,
            cost,
            cost_constant: self.cost_constant,
            variables,
            objective_sense: self.objective_sense,
            n_structural: n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leq_constraint_gets_nonnegative_slack_and_upper_rhs() {
        let mut b = ModelBuilder::new();
        let x = b.structural_var("x", 1.0, 0.0, f64::INFINITY);
        b.constraint("c0", ConstraintShape::Leq, vec![(x, 1.0)], 0.0, 5.0);
        let model = b.build();
        assert_eq!(model.n_rows(), 1);
        assert_eq!(model.rhs[0], 5.0);
        let slack = &model.variables[model.n_structural];
        assert_eq!(slack.lower, 0.0);
        assert_eq!(slack.upper, f64::INFINITY);
        assert_eq!(model.matrix.get(0, model.n_structural), 1.0);
    }

    #[test]
    fn geq_constraint_gets_nonpositive_slack_and_lower_rhs() {
        let mut b = ModelBuilder::new();
        let x = b.structural_var("x", 1.0, 0.0, f64::INFINITY);
        b.constraint("c0", ConstraintShape::Geq, vec![(x, 1.0)], 1.0, 0.0);
        let model = b.build();
        assert_eq!(model.rhs[0], 1.0);
        let slack = &model.variables[model.n_structural];
        assert_eq!(slack.lower, f64::NEG_INFINITY);
        assert_eq!(slack.upper, 0.0);
    }

    #[test]
    fn eq_constraint_gets_fixed_zero_slack() {
        let mut b = ModelBuilder::new();
        let x = b.structural_var("x", 1.0, 0.0, f64::INFINITY);
        b.constraint("c0", ConstraintShape::Eq, vec![(x, 1.0)], 0.0, 3.0);
        let model = b.build();
        let slack = &model.variables[model.n_structural];
        assert_eq!(slack.var_type, VariableType::Fixed);
        assert_eq!(model.rhs[0], 3.0);
    }

    #[test]
    fn range_constraint_slack_width_matches_bound_gap() {
        let mut b = ModelBuilder::new();
        let x = b.structural_var("x", 1.0, 0.0, f64::INFINITY);
        b.constraint("c0", ConstraintShape::Range, vec![(x, 1.0)], 2.0, 7.0);
        let model = b.build();
        let slack = &model.variables[model.n_structural];
        assert_eq!(slack.lower, 0.0);
        assert_eq!(slack.upper, 5.0);
        assert_eq!(model.rhs[0], 7.0);
    }

    #[test]
    fn variable_type_is_pure_function_of_bounds() {
        assert_eq!(VariableType::classify(0.0, f64::INFINITY), VariableType::Plus);
        assert_eq!(VariableType::classify(f64::NEG_INFINITY, 0.0), VariableType::Minus);
        assert_eq!(VariableType::classify(f64::NEG_INFINITY, f64::INFINITY), VariableType::Free);
        assert_eq!(VariableType::classify(1.0, 1.0), VariableType::Fixed);
        assert_eq!(VariableType::classify(0.0, 1.0), VariableType::Bounded);
    }
}
