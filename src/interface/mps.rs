//! Conversion from [MPS](https://en.wikipedia.org/wiki/MPS_(format)) models
//! (as parsed by the [`mps`] crate) into the engine's
//! [`ComputationalModel`](crate::model::ComputationalModel).
//!
//! Grounded on `amadavan-copters/src/interface/netlib.rs`'s
//! `TryFromMpsModel` conversion (deterministic `BTreeMap` index assignment,
//! the same `Nr`/`Leq`/`Geq`/bound-type handling), adapted to build a
//! [`ModelBuilder`] instead of a dense `faer`-backed `LinearProgram`: no
//! slack columns are added by hand here, since [`ModelBuilder::build`]
//! already appends the logical variable per constraint (spec §4.E).
//!
//! Out of scope per spec §1/§6: this is the thinnest possible adapter from
//! a parsed MPS model to the canonical form; the engine never parses MPS
//! text itself.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use problemo::Problem;

use crate::model::{ComputationalModel, ConstraintShape, ModelBuilder};

/// Fallible conversion from a parsed MPS model into a [`ComputationalModel`].
///
/// A standalone trait rather than a [`TryFrom`] impl, since neither the MPS
/// model type nor `ComputationalModel` is defined in the same crate as
/// this conversion.
pub trait TryFromMpsModel {
    fn try_into_computational_model(self) -> Result<ComputationalModel, Problem>;
}

impl TryFromMpsModel for mps::model::Model<f32> {
    fn try_into_computational_model(self) -> Result<ComputationalModel, Problem> {
        let row_type: HashMap<_, _> = self.row_types.0.iter().collect();

        let var_names: BTreeSet<_> = self.values.0.iter().map(|((_, var), _)| var.clone()).collect();
        let var_idx: BTreeMap<_, _> = var_names.iter().cloned().enumerate().map(|(i, name)| (name, i)).collect();

        let con_names: BTreeMap<_, _> = self
            .row_types
            .0
            .iter()
            .map(|(name, _)| name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|name| row_type.get(name) != Some(&&mps::types::RowType::Nr))
            .enumerate()
            .map(|(i, name)| (name, i))
            .collect();

        let n_var = var_idx.len();

        // Objective coefficients, from the Nr-typed row.
        let mut cost = vec![0.0_f64; n_var];
        for ((con, var), &val) in self.values.0.iter() {
            if row_type.get(con) == Some(&&mps::types::RowType::Nr) {
                cost[var_idx[var]] = val as f64;
            }
        }

        // Bounds, defaulting to [0, +inf) per the MPS convention; applied
        // before variables are created so `ModelBuilder::structural_var`
        // sees the final bound pair in one call.
        let mut lower = vec![0.0_f64; n_var];
        let mut upper = vec![f64::INFINITY; n_var];
        for (_set_name, entries) in self.bounds.0.iter() {
            for (&(ref var_name, bound_type), val) in entries.iter() {
                let Some(&j) = var_idx.get(var_name) else { continue };
                match bound_type {
                    mps::types::BoundType::Lo => lower[j] = val.unwrap() as f64,
                    mps::types::BoundType::Up => upper[j] = val.unwrap() as f64,
                    mps::types::BoundType::Fr => {
                        lower[j] = f64::NEG_INFINITY;
                        upper[j] = f64::INFINITY;
                    }
                    mps::types::BoundType::Mi => {
                        lower[j] = f64::NEG_INFINITY;
                        upper[j] = 0.0;
                    }
                    mps::types::BoundType::Pl => {
                        lower[j] = 0.0;
                        upper[j] = f64::INFINITY;
                    }
                    mps::types::BoundType::Fx => {
                        let v = val.unwrap() as f64;
                        lower[j] = v;
                        upper[j] = v;
                    }
                    other => {
                        return Err(Problem::from(crate::error::SimplexError::InvalidConfiguration {
                            key: format!("unsupported MPS bound type {other:?}"),
                        }));
                    }
                }
            }
        }

        let mut builder = ModelBuilder::new();
        let idx_by_name: BTreeMap<_, _> = var_idx
            .iter()
            .map(|(name, &j)| {
                (name.clone(), builder.structural_var(name.clone(), cost[j], lower[j], upper[j]))
            })
            .collect();

        // Per-row coefficients, keyed by the row's assigned constraint index.
        let mut row_coeffs: Vec<Vec<(usize, f64)>> = vec![Vec::new(); con_names.len()];
        for ((con, var), &val) in self.values.0.iter() {
            if val == 0.0 {
                continue;
            }
            let Some(&i) = con_names.get(con) else { continue };
            row_coeffs[i].push((idx_by_name[var], val as f64));
        }

        let mut rhs_by_row = vec![0.0_f64; con_names.len()];
        for (_rhs_set, entries) in self.rhs.0.iter() {
            for (con, &val) in entries.iter() {
                if let Some(&i) = con_names.get(con) {
                    rhs_by_row[i] = val as f64;
                }
            }
        }

        for (name, &i) in con_names.iter() {
            let shape = match row_type.get(name) {
                Some(&&mps::types::RowType::Leq) => ConstraintShape::Leq,
                Some(&&mps::types::RowType::Geq) => ConstraintShape::Geq,
                _ => ConstraintShape::Eq,
            };
            let b = rhs_by_row[i];
            let (lower_b, upper_b) = match shape {
                ConstraintShape::Geq => (b, 0.0),
                _ => (0.0, b),
            };
            builder.constraint(name.clone(), shape, std::mem::take(&mut row_coeffs[i]), lower_b, upper_b);
        }

        Ok(builder.build())
    }
}
