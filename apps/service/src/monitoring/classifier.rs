//! Maps a raw probe outcome to a health state.

use super::types::{FailureKind, HealthState, ProbeOutcome};

/// Classify a probe outcome against the configured request timeout.
///
/// Rules are applied in order: a timeout abort without a response is
/// `Timeout`, a response slower than the timeout is `Slow` whatever its
/// status, then 2xx is `Up`, 4xx is `Restricted` and everything else
/// (5xx, 1xx, 3xx, connection errors) is `Down`.
pub fn classify(outcome: &ProbeOutcome, request_timeout_ms: u64) -> (HealthState, bool) {
    let state = match *outcome {
        ProbeOutcome::Failure { kind: FailureKind::Timeout, .. } => HealthState::Timeout,
        ProbeOutcome::Failure { kind: FailureKind::Connection, .. } => HealthState::Down,
        ProbeOutcome::Response { elapsed_ms, .. } if elapsed_ms > request_timeout_ms => {
            HealthState::Slow
        }
        ProbeOutcome::Response { status_code: 200..=299, .. } => HealthState::Up,
        ProbeOutcome::Response { status_code: 400..=499, .. } => HealthState::Restricted,
        ProbeOutcome::Response { .. } => HealthState::Down,
    };

    (state, state.is_up())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT_MS: u64 = 5000;

    fn response(status_code: u16, elapsed_ms: u64) -> ProbeOutcome {
        ProbeOutcome::Response { status_code, elapsed_ms }
    }

    #[test]
    fn test_ok_response_is_up() {
        assert_eq!(classify(&response(200, 50), TIMEOUT_MS), (HealthState::Up, true));
        assert_eq!(classify(&response(204, 10), TIMEOUT_MS), (HealthState::Up, true));
    }

    #[test]
    fn test_client_error_is_restricted() {
        assert_eq!(classify(&response(404, 80), TIMEOUT_MS), (HealthState::Restricted, false));
        assert_eq!(classify(&response(401, 80), TIMEOUT_MS), (HealthState::Restricted, false));
    }

    #[test]
    fn test_slow_response_is_slow_regardless_of_status() {
        assert_eq!(classify(&response(200, 6000), TIMEOUT_MS), (HealthState::Slow, false));
        assert_eq!(classify(&response(503, 6000), TIMEOUT_MS), (HealthState::Slow, false));
        assert_eq!(classify(&response(404, 5001), TIMEOUT_MS), (HealthState::Slow, false));
    }

    #[test]
    fn test_response_exactly_at_timeout_is_not_slow() {
        assert_eq!(classify(&response(200, TIMEOUT_MS), TIMEOUT_MS), (HealthState::Up, true));
    }

    #[test]
    fn test_timeout_abort_is_timeout() {
        let outcome = ProbeOutcome::Failure { kind: FailureKind::Timeout, elapsed_ms: 5000 };
        assert_eq!(classify(&outcome, TIMEOUT_MS), (HealthState::Timeout, false));
    }

    #[test]
    fn test_connection_error_is_down() {
        let outcome = ProbeOutcome::Failure { kind: FailureKind::Connection, elapsed_ms: 12 };
        assert_eq!(classify(&outcome, TIMEOUT_MS), (HealthState::Down, false));

        // Still down when the connection error itself took longer than the timeout
        let late = ProbeOutcome::Failure { kind: FailureKind::Connection, elapsed_ms: 9000 };
        assert_eq!(classify(&late, TIMEOUT_MS), (HealthState::Down, false));
    }

    #[test]
    fn test_server_error_and_other_statuses_are_down() {
        assert_eq!(classify(&response(503, 30), TIMEOUT_MS), (HealthState::Down, false));
        assert_eq!(classify(&response(500, 30), TIMEOUT_MS), (HealthState::Down, false));
        assert_eq!(classify(&response(101, 30), TIMEOUT_MS), (HealthState::Down, false));
        assert_eq!(classify(&response(302, 30), TIMEOUT_MS), (HealthState::Down, false));
    }

    #[test]
    fn test_classification_is_total_and_consistent() {
        for status_code in 100..=599u16 {
            for elapsed_ms in [0, 1, TIMEOUT_MS, TIMEOUT_MS + 1, 60_000] {
                let outcome = response(status_code, elapsed_ms);
                let (state, is_up) = classify(&outcome, TIMEOUT_MS);
                assert_eq!(is_up, state == HealthState::Up);
                assert_eq!(classify(&outcome, TIMEOUT_MS), (state, is_up));

                let expected_up = (200..300).contains(&status_code) && elapsed_ms <= TIMEOUT_MS;
                assert_eq!(is_up, expected_up, "status {status_code} after {elapsed_ms}ms");
            }
        }

        for kind in [FailureKind::Timeout, FailureKind::Connection] {
            let (state, is_up) = classify(&ProbeOutcome::Failure { kind, elapsed_ms: 1 }, TIMEOUT_MS);
            assert!(!is_up);
            assert_ne!(state, HealthState::Up);
        }
    }
}
