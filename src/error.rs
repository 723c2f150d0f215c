//! Error kinds raised by the simplex engine.
//!
//! Every variant here is a refuse-to-start or terminate-the-solve condition
//! (§7). Recoverable conditions (a single unstable pivot candidate) are
//! handled locally by the control loop's lock-and-retry path and never reach
//! this type.

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum SimplexError {
    #[display("pivot {pivot} at row {row} is below the stability threshold")]
    NumericalFailure { row: usize, pivot: f64 },
    #[display("basis is singular: {count} row(s) had no eligible pivot")]
    SingularBasis { count: usize },
    #[display("unknown or unparseable configuration value for key \"{key}\"")]
    InvalidConfiguration { key: String },
    #[display("warm-start basis references unknown variable index {index}")]
    BasisLoadError { index: usize },
}
