//! Application services layer.

pub mod apod;
pub mod error;
pub mod upstream;
