//! Bill domain model and presentation-facing label tables.

mod bill_model;
pub mod display;

pub use bill_model::*;
