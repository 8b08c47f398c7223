//! Tracing subscriber setup shared by the uptrack binaries.

mod subscriber;

pub use subscriber::{init, init_with_level};
