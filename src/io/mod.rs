//! Basis persistence: the in-memory warm-start shape, not the BAS/PBF
//! file grammar itself (spec §1/§6 put the file I/O outside the core).

pub mod basis;

pub use basis::{BasisHead, BasisSource, NonbasicPin};
