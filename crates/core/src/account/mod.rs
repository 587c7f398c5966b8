//! Account lifecycle operations.

mod teardown;

pub use teardown::*;
