//! Core domain types, the shape classifier, and the projection-engine
//! contract shared across the crate.

pub mod engine;
pub mod types;

pub use engine::*;
pub use types::*;
