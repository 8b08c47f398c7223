//! Uptime monitoring engine: periodic HTTP checks of registered endpoints,
//! an append-only check history in SQLite and the aggregates read from it.

pub mod config;
pub mod database;
pub mod error;
pub mod history;
pub mod monitoring;
pub mod pool;
pub mod service;
pub mod validation;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{MonitorError, ProbeError, StorageError};
pub use service::{MonitorService, Registration};
