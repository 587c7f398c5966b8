//! HTTP client for the billfolio cloud document store.
//!
//! The remote side is a passive per-user document collection; all sync
//! logic lives in `billfolio-core`. This crate implements the core's
//! `RemoteBillStore` and `IdentityStore` adapter traits over REST.

mod client;
mod error;
mod types;

pub use client::CloudStoreClient;
pub use error::{ApiRetryClass, CloudStoreError, Result};
pub use types::*;
