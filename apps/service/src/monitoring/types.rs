use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::error::ProbeError;

/// Health of an endpoint as decided by a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthState {
    Up,
    Slow,
    Restricted,
    Down,
    Timeout,
}

impl HealthState {
    pub const ALL: [HealthState; 5] = [
        HealthState::Up,
        HealthState::Slow,
        HealthState::Restricted,
        HealthState::Down,
        HealthState::Timeout,
    ];

    /// Only `Up` counts towards uptime
    pub fn is_up(self) -> bool {
        matches!(self, HealthState::Up)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Up => "UP",
            HealthState::Slow => "SLOW",
            HealthState::Restricted => "RESTRICTED",
            HealthState::Down => "DOWN",
            HealthState::Timeout => "TIMEOUT",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown health state: {0}")]
pub struct UnknownHealthState(pub String);

impl FromStr for HealthState {
    type Err = UnknownHealthState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HealthState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownHealthState(s.to_string()))
    }
}

/// Network level failure classes reported by a prober
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request was aborted because it hit the configured timeout
    Timeout,
    /// DNS failure, refused connection, TLS error and anything else without a response
    Connection,
}

/// Raw result of one probe, before classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Response { status_code: u16, elapsed_ms: u64 },
    Failure { kind: FailureKind, elapsed_ms: u64 },
}

impl ProbeOutcome {
    pub fn elapsed_ms(&self) -> u64 {
        match *self {
            ProbeOutcome::Response { elapsed_ms, .. } | ProbeOutcome::Failure { elapsed_ms, .. } => {
                elapsed_ms
            }
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match *self {
            ProbeOutcome::Response { status_code, .. } => Some(status_code),
            ProbeOutcome::Failure { .. } => None,
        }
    }
}

impl From<&ProbeError> for ProbeOutcome {
    fn from(error: &ProbeError) -> Self {
        match *error {
            ProbeError::Timeout { elapsed_ms } => {
                ProbeOutcome::Failure { kind: FailureKind::Timeout, elapsed_ms }
            }
            ProbeError::Connection { elapsed_ms, .. } => {
                ProbeOutcome::Failure { kind: FailureKind::Connection, elapsed_ms }
            }
        }
    }
}

/// Result of checking one endpoint once, returned after the row was persisted
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    /// Row id of the persisted check
    pub check_id: i64,

    pub endpoint_id: i64,

    /// HTTP status code, absent when no response was received
    pub status_code: Option<u16>,

    /// Wall clock time from dispatch to completion or abort
    pub response_time_ms: u64,

    pub state: HealthState,

    pub is_up: bool,

    /// Description of the network failure, if any
    pub error_message: Option<String>,

    pub checked_at: DateTime<Utc>,
}
