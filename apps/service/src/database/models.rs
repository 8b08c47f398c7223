use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::types::HealthState;

/// Endpoint model - an HTTP target registered by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Endpoint that has not been stored yet
#[derive(Debug, Clone)]
pub struct NewEndpoint {
    pub owner_id: i64,
    pub name: String,
    pub url: String,
}

/// CheckResult model - one persisted check, append-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: i64,
    pub endpoint_id: i64,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub is_up: bool,
    pub state: HealthState,
    pub checked_at: DateTime<Utc>,
}

/// Check row about to be inserted
#[derive(Debug, Clone)]
pub struct NewCheckResult {
    pub endpoint_id: i64,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub is_up: bool,
    pub state: HealthState,
    pub checked_at: DateTime<Utc>,
}

/// Raw aggregates over the full check history of an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CheckAggregates {
    pub total_checks: u64,
    pub successful_checks: u64,
    pub avg_response_time_ms: Option<f64>,
    pub min_response_time_ms: Option<u64>,
    pub max_response_time_ms: Option<u64>,
}

/// Convert a timestamp to Unix milliseconds for storage
pub fn timestamp_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert stored Unix milliseconds back to a timestamp
pub fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
