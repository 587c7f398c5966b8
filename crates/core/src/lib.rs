//! Billfolio core: bill records, reminder timing, and the offline-first
//! synchronization engine.
//!
//! This crate is UI-free. Storage and cloud transport live behind the
//! adapter traits in [`sync`]; the concrete implementations are provided by
//! `billfolio-storage-sqlite` and `billfolio-cloud-store`.

pub mod account;
pub mod bills;
pub mod errors;
pub mod reminders;
pub mod sync;

pub use errors::{Error, Result};
