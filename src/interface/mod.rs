//! External interfaces: the thin adapters between file formats owned by
//! other collaborators (spec §1/§6) and the engine's own
//! [`ComputationalModel`](crate::model::ComputationalModel).

#[cfg(feature = "mps")]
pub mod mps;
