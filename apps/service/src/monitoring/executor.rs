use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use super::checker::{ProbeResponse, Prober};
use super::classifier::classify;
use super::types::{CheckOutcome, ProbeOutcome};
use crate::database::Database;
use crate::database::models::{Endpoint, NewCheckResult};
use crate::error::{MonitorError, ProbeError, StorageError};

/// Monitoring executor - probes one endpoint, classifies and records the result
pub struct MonitoringExecutor {
    prober: Arc<dyn Prober>,
    database: Arc<dyn Database>,
    request_timeout: Duration,
}

impl MonitoringExecutor {
    /// Create a new monitoring executor
    pub fn new(prober: Arc<dyn Prober>, database: Arc<dyn Database>, request_timeout: Duration) -> Self {
        Self { prober, database, request_timeout }
    }

    /// Execute a check against `endpoint`.
    ///
    /// Exactly one check row is written per call, including when the probe
    /// failed or panicked. The only error is a failure to write that row.
    pub async fn execute_check(&self, endpoint: &Endpoint) -> Result<CheckOutcome, MonitorError> {
        let timeout_ms = self.request_timeout.as_millis() as u64;

        let (outcome, error_message) = match self.request(&endpoint.url).await {
            Ok(response) => (
                ProbeOutcome::Response {
                    status_code: response.status_code,
                    elapsed_ms: response.elapsed_ms,
                },
                None,
            ),
            Err(e) => (ProbeOutcome::from(&e), Some(e.to_string())),
        };

        let (state, is_up) = classify(&outcome, timeout_ms);
        let record = NewCheckResult {
            endpoint_id: endpoint.id,
            status_code: outcome.status_code(),
            response_time_ms: Some(outcome.elapsed_ms()),
            is_up,
            state,
            checked_at: Utc::now(),
        };

        let check_id =
            match tokio::time::timeout(self.request_timeout, self.database.insert_check_result(&record)).await {
                Ok(Ok(id)) => id,
                Ok(Err(e)) => {
                    error!(endpoint_id = endpoint.id, "Failed to record check result: {}", e);
                    return Err(e.into());
                }
                Err(_) => {
                    error!(endpoint_id = endpoint.id, "Recording check result timed out");
                    return Err(StorageError::Timeout(timeout_ms).into());
                }
            };

        debug!(
            endpoint_id = endpoint.id,
            url = %endpoint.url,
            state = %state,
            status_code = ?record.status_code,
            latency_ms = outcome.elapsed_ms(),
            "Check recorded"
        );

        Ok(CheckOutcome {
            check_id,
            endpoint_id: endpoint.id,
            status_code: record.status_code,
            response_time_ms: outcome.elapsed_ms(),
            state,
            is_up,
            error_message,
            checked_at: record.checked_at,
        })
    }

    /// A panic while requesting is reported as a connection failure
    async fn request(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        let start = Instant::now();
        match AssertUnwindSafe(self.prober.get(url, self.request_timeout)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                warn!(url, "Request panicked");
                Err(ProbeError::Connection {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    message: "request panicked".to_string(),
                })
            }
        }
    }
}
