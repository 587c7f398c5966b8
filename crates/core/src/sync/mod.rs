//! Sync domain models, adapter contracts, and the sync engine.

mod adapters;
mod sync_engine;
mod sync_model;
mod sync_scheduler;

pub use adapters::*;
pub use sync_engine::*;
pub use sync_model::*;
pub use sync_scheduler::*;

#[cfg(test)]
mod tests;
