//! Reminder-instant computation and platform alarm orchestration.

mod reminder_engine;
mod reminder_service;

pub use reminder_engine::*;
pub use reminder_service::*;
