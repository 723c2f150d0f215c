//! Basis factorization: the capability set shared by every concrete
//! factorization strategy.
//!
//! The abstraction is closed and small (`invert`, `append`, `ftran`,
//! `btran`, `is_fresh`, `singularity_count`), so per spec Design Notes §9
//! it is modeled as a tagged variant over a concrete enum via
//! `enum_dispatch`, not as an open-ended `dyn Trait`.

pub mod pfi;

use enum_dispatch::enum_dispatch;

use crate::I;
use crate::error::SimplexError;
use crate::model::ComputationalModel;
use crate::tolerance::Tolerances;
use crate::vector::HybridVector;
pub use pfi::{Etm, NontriangularMethod, Pfi};

/// The factored representation of the current `m x m` basis.
#[enum_dispatch]
pub trait Basis {
    /// Rebuild the factorization from scratch for the given basis head.
    /// Discards any update ETMs.
    fn invert(&mut self, model: &ComputationalModel, head: &[I], tol: &Tolerances)
    -> Result<(), SimplexError>;

    /// Record a pivot: `alpha` is the FTRAN'd entering column, `pivot_row`
    /// the row it replaces. Appended to the update list.
    fn append(&mut self, alpha: &HybridVector, pivot_row: I, entering: I, tol: &Tolerances)
    -> Result<(), SimplexError>;

    /// `v <- B^-1 v`, applying frozen then update ETMs in recorded order.
    fn ftran(&self, v: &mut HybridVector, tol: &Tolerances);

    /// `v <- v^T B^-1`, applying update then frozen ETMs, each in reverse
    /// of its recorded order.
    fn btran(&self, v: &mut HybridVector, tol: &Tolerances);

    /// True when no update ETMs have been appended since the last
    /// `invert`.
    fn is_fresh(&self) -> bool;

    /// Rows that had no eligible pivot during the last `invert` and were
    /// filled with their logical variable instead.
    fn singularity_count(&self) -> usize;

    /// Basic variable index currently assigned to each row.
    fn head(&self) -> &[I];

    /// Number of update ETMs appended since the last `invert`.
    fn update_count(&self) -> usize;
}

#[enum_dispatch(Basis)]
pub enum FactorizationKind {
    Pfi,
}
