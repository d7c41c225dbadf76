//! Domain layer types and invariants.

pub mod apod;
pub mod error;
