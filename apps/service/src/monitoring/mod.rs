/// Monitoring engine module - periodic health checks of registered endpoints
///
/// This module is responsible for:
/// - Probing HTTP/HTTPS endpoints
/// - Classifying probe outcomes into health states
/// - Recording one check row per endpoint and sweep
/// - Scheduling non-overlapping sweeps
pub mod checker;
pub mod classifier;
pub mod executor;
pub mod scheduler;
pub mod types;

pub use checker::{HttpProber, Prober};
pub use classifier::classify;
pub use executor::MonitoringExecutor;
pub use scheduler::{MonitoringScheduler, SchedulerState, SweepReport, SweepSummary};
pub use types::{CheckOutcome, HealthState};
