//! Warm-start basis representation (spec §6): the in-memory shape a
//! BAS/PBF file loader -- an external collaborator -- hands to the engine.
//! No file grammar lives here; parsing the textual BAS or binary PBF
//! layout is out of scope for the core (spec §1).

use crate::I;
use crate::error::SimplexError;
use crate::model::ComputationalModel;

/// How a nonbasic variable is pinned: at its lower bound, upper bound,
/// fixed (`l = u`), or free (pinned at `0`). Mirrors the `LB|UB|FX|FR`
/// tags of the textual BAS format (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonbasicPin {
    Lower,
    Upper,
    Fixed,
    Free,
}

/// A parsed warm-start basis: one basic variable index per row, plus the
/// pin for every nonbasic variable. Shape-compatible with both the
/// textual BAS and binary PBF file formats of spec §6 without committing
/// to either's byte layout.
#[derive(Debug, Clone)]
pub struct BasisHead {
    pub basic: Vec<I>,
    pub nonbasic: Vec<(I, NonbasicPin)>,
}

impl BasisHead {
    /// Check internal consistency against `model`: the basic list has
    /// exactly `m` entries with no duplicates, every index referenced by
    /// either list is in range, and the two lists partition `[0, n+m)`
    /// exactly (spec §7's `BasisLoadError`).
    pub fn validate(&self, model: &ComputationalModel) -> Result<(), SimplexError> {
        let m = model.n_rows();
        let n_cols = model.n_cols();
        if self.basic.len() != m {
            return Err(SimplexError::BasisLoadError { index: self.basic.len() });
        }
        let mut seen = vec![false; n_cols];
        for &j in &self.basic {
            if j >= n_cols {
                return Err(SimplexError::BasisLoadError { index: j });
            }
            if seen[j] {
                return Err(SimplexError::BasisLoadError { index: j });
            }
            seen[j] = true;
        }
        for &(j, _) in &self.nonbasic {
            if j >= n_cols {
                return Err(SimplexError::BasisLoadError { index: j });
            }
            if seen[j] {
                return Err(SimplexError::BasisLoadError { index: j });
            }
            seen[j] = true;
        }
        if seen.iter().any(|&s| !s) {
            let missing = seen.iter().position(|&s| !s).unwrap();
            return Err(SimplexError::BasisLoadError { index: missing });
        }
        Ok(())
    }
}

/// Implemented by the external BAS/PBF loader; the engine only ever
/// consumes the already-parsed [`BasisHead`] this trait produces.
pub trait BasisSource {
    fn load(&self) -> Result<BasisHead, SimplexError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstraintShape, ModelBuilder};

    fn one_row_model() -> ComputationalModel {
        let mut b = ModelBuilder::new();
        let x = b.structural_var("x", 1.0, 0.0, f64::INFINITY);
        b.constraint("c0", ConstraintShape::Leq, vec![(x, 1.0)], 0.0, 5.0);
        b.build()
    }

    #[test]
    fn well_formed_basis_validates() {
        let model = one_row_model();
        let basis = BasisHead { basic: vec![1], nonbasic: vec![(0, NonbasicPin::Lower)] };
        assert!(basis.validate(&model).is_ok());
    }

    #[test]
    fn wrong_basic_count_is_rejected() {
        let model = one_row_model();
        let basis = BasisHead { basic: vec![], nonbasic: vec![(0, NonbasicPin::Lower), (1, NonbasicPin::Lower)] };
        assert!(basis.validate(&model).is_err());
    }

    #[test]
    fn incomplete_partition_is_rejected() {
        let model = one_row_model();
        let basis = BasisHead { basic: vec![1], nonbasic: vec![] };
        assert!(basis.validate(&model).is_err());
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let model = one_row_model();
        let basis = BasisHead { basic: vec![1], nonbasic: vec![(1, NonbasicPin::Lower)] };
        assert!(basis.validate(&model).is_err());
    }
}
