use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::database::Database;
use crate::database::models::{CheckResult, Endpoint};
use crate::error::{MonitorError, StorageError};
use crate::monitoring::types::HealthState;

/// Entries in a sparkline when no limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 24;

/// Window of the headline rolling average
pub const DEFAULT_AVERAGE_WINDOW: usize = 10;

/// Checks per page when browsing history
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Latest known health of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "check", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LatestStatus {
    /// No check row exists yet. Never persisted.
    NotChecked,
    Checked(CheckResult),
}

impl LatestStatus {
    pub fn label(&self) -> String {
        match self {
            LatestStatus::NotChecked => "NOT CHECKED YET".to_string(),
            LatestStatus::Checked(check) => check.state.to_string(),
        }
    }
}

/// One bar of the recent history timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub is_up: bool,
    pub state: HealthState,
    pub checked_at: DateTime<Utc>,
}

impl From<CheckResult> for HistoryEntry {
    fn from(check: CheckResult) -> Self {
        Self { is_up: check.is_up, state: check.state, checked_at: check.checked_at }
    }
}

/// Statistics over the full check history of an endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckStatistics {
    pub total_checks: u64,
    pub successful_checks: u64,
    /// `None` when there are no checks
    pub uptime_percentage: Option<f64>,
    pub avg_response_time_ms: Option<u64>,
    pub min_response_time_ms: Option<u64>,
    pub max_response_time_ms: Option<u64>,
    pub last_10_avg_response_time_ms: Option<u64>,
    pub last_5_avg_response_time_ms: Option<u64>,
}

impl CheckStatistics {
    /// Uptime with two decimals, or "N/A" without checks
    pub fn uptime_label(&self) -> String {
        match self.uptime_percentage {
            Some(uptime) => format!("{uptime:.2}%"),
            None => "N/A".to_string(),
        }
    }
}

/// What a dashboard row shows for an endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointOverview {
    pub endpoint: Endpoint,
    pub latest_check: Option<CheckResult>,
    pub last_10_avg_response_time_ms: Option<u64>,
    pub recent_history: Vec<HistoryEntry>,
    /// Uptime over `recent_history` only, whole percent
    pub recent_uptime_percentage: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub page: usize,
    pub limit: usize,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckHistoryPage {
    pub endpoint: Endpoint,
    pub checks: Vec<CheckResult>,
    pub pagination: Pagination,
}

/// Arithmetic mean rounded to the nearest millisecond
pub fn mean_rounded(values: &[u64]) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let sum: u64 = values.iter().sum();
    Some((sum as f64 / values.len() as f64).round() as u64)
}

/// `successful / total * 100` with two decimals
pub fn uptime_percentage(successful: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let percentage = successful as f64 / total as f64 * 100.0;
    Some((percentage * 100.0).round() / 100.0)
}

/// Share of `Up` entries in a history window, whole percent
pub fn window_uptime(entries: &[HistoryEntry]) -> Option<u32> {
    if entries.is_empty() {
        return None;
    }
    let up = entries.iter().filter(|e| e.is_up).count();
    Some((up as f64 / entries.len() as f64 * 100.0).round() as u32)
}

/// Read-side views over persisted check rows. Holds no state of its own.
#[derive(Clone)]
pub struct HistoryAggregator {
    database: Arc<dyn Database>,
}

impl HistoryAggregator {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Most recent check, or `NotChecked` when there is none
    pub async fn latest_status(&self, endpoint_id: i64) -> Result<LatestStatus, StorageError> {
        let latest = self.database.latest_check(endpoint_id).await?;
        Ok(latest.map_or(LatestStatus::NotChecked, LatestStatus::Checked))
    }

    /// Mean response time over the `n` most recent checks that recorded one.
    ///
    /// Uses however many exist when fewer than `n`; `None` without any.
    pub async fn rolling_average(&self, endpoint_id: i64, n: usize) -> Result<Option<u64>, StorageError> {
        if n == 0 {
            return Ok(None);
        }
        let times = self.database.recent_response_times(endpoint_id, n).await?;
        Ok(mean_rounded(&times))
    }

    /// The `limit` most recent checks, oldest first
    pub async fn recent_history(&self, endpoint_id: i64, limit: usize) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut checks = self.database.query_recent_checks(endpoint_id, limit).await?;
        checks.reverse();
        Ok(checks.into_iter().map(HistoryEntry::from).collect())
    }

    pub async fn statistics(&self, endpoint_id: i64) -> Result<CheckStatistics, StorageError> {
        let aggregates = self.database.check_statistics(endpoint_id).await?;

        Ok(CheckStatistics {
            total_checks: aggregates.total_checks,
            successful_checks: aggregates.successful_checks,
            uptime_percentage: uptime_percentage(aggregates.successful_checks, aggregates.total_checks),
            avg_response_time_ms: aggregates.avg_response_time_ms.map(|avg| avg.round() as u64),
            min_response_time_ms: aggregates.min_response_time_ms,
            max_response_time_ms: aggregates.max_response_time_ms,
            last_10_avg_response_time_ms: self.rolling_average(endpoint_id, 10).await?,
            last_5_avg_response_time_ms: self.rolling_average(endpoint_id, 5).await?,
        })
    }

    pub async fn overview(&self, endpoint: Endpoint) -> Result<EndpointOverview, StorageError> {
        let latest_check = match self.latest_status(endpoint.id).await? {
            LatestStatus::Checked(check) => Some(check),
            LatestStatus::NotChecked => None,
        };
        let recent_history = self.recent_history(endpoint.id, DEFAULT_HISTORY_LIMIT).await?;

        Ok(EndpointOverview {
            last_10_avg_response_time_ms: self.rolling_average(endpoint.id, DEFAULT_AVERAGE_WINDOW).await?,
            recent_uptime_percentage: window_uptime(&recent_history),
            latest_check,
            recent_history,
            endpoint,
        })
    }

    /// Checks newest first, `page` counted from 1
    pub async fn check_history(
        &self,
        endpoint_id: i64,
        page: usize,
        limit: usize,
    ) -> Result<CheckHistoryPage, MonitorError> {
        let endpoint = self
            .database
            .get_endpoint(endpoint_id)
            .await?
            .ok_or(MonitorError::EndpointNotFound(endpoint_id))?;

        let page = page.max(1);
        let limit = limit.max(1);
        let total = self.database.count_checks(endpoint_id).await?;
        let checks = self.database.query_checks_page(endpoint_id, limit, (page - 1) * limit).await?;

        Ok(CheckHistoryPage {
            endpoint,
            checks,
            pagination: Pagination { total, page, limit, total_pages: total.div_ceil(limit as u64) },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseImpl;
    use crate::database::models::{NewCheckResult, NewEndpoint, millis_to_timestamp};
    use crate::testing::sqlite_database;
    use tempfile::TempDir;

    struct Fixture {
        db: Arc<DatabaseImpl>,
        history: HistoryAggregator,
        endpoint: Endpoint,
        _dir: TempDir,
        next_ms: i64,
    }

    impl Fixture {
        async fn new() -> Self {
            let (db, dir) = sqlite_database().await;
            let db = Arc::new(db);
            let endpoint = db
                .create_endpoint(&NewEndpoint {
                    owner_id: 1,
                    name: "api".to_string(),
                    url: "https://api.example.com".to_string(),
                })
                .await
                .unwrap();
            Self { history: HistoryAggregator::new(db.clone()), db, endpoint, _dir: dir, next_ms: 1_000 }
        }

        async fn record(&mut self, state: HealthState, response_time_ms: Option<u64>) {
            self.next_ms += 60_000;
            self.db
                .insert_check_result(&NewCheckResult {
                    endpoint_id: self.endpoint.id,
                    status_code: Some(200),
                    response_time_ms,
                    is_up: state.is_up(),
                    state,
                    checked_at: millis_to_timestamp(self.next_ms),
                })
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_mean_rounds_to_nearest() {
        assert_eq!(mean_rounded(&[]), None);
        assert_eq!(mean_rounded(&[100, 200, 300]), Some(200));
        assert_eq!(mean_rounded(&[1, 2]), Some(2));
        assert_eq!(mean_rounded(&[1, 1, 2]), Some(1));
    }

    #[test]
    fn test_uptime_percentage_precision() {
        assert_eq!(uptime_percentage(0, 0), None);
        assert_eq!(uptime_percentage(2, 3), Some(66.67));
        assert_eq!(uptime_percentage(1, 8), Some(12.5));
        assert_eq!(uptime_percentage(5, 5), Some(100.0));
    }

    #[tokio::test]
    async fn test_not_checked_without_rows() {
        let fixture = Fixture::new().await;
        let id = fixture.endpoint.id;

        let latest = fixture.history.latest_status(id).await.unwrap();
        assert_eq!(latest, LatestStatus::NotChecked);
        assert_eq!(latest.label(), "NOT CHECKED YET");
        assert_eq!(fixture.history.rolling_average(id, 10).await.unwrap(), None);
        assert!(fixture.history.recent_history(id, 24).await.unwrap().is_empty());

        let stats = fixture.history.statistics(id).await.unwrap();
        assert_eq!(stats.total_checks, 0);
        assert_eq!(stats.uptime_label(), "N/A");
        assert_eq!(stats.avg_response_time_ms, None);
    }

    #[tokio::test]
    async fn test_latest_status_is_newest_row() {
        let mut fixture = Fixture::new().await;
        fixture.record(HealthState::Up, Some(10)).await;
        fixture.record(HealthState::Restricted, Some(20)).await;

        match fixture.history.latest_status(fixture.endpoint.id).await.unwrap() {
            LatestStatus::Checked(check) => {
                assert_eq!(check.state, HealthState::Restricted);
                assert_eq!(check.response_time_ms, Some(20));
            }
            LatestStatus::NotChecked => panic!("expected a check"),
        }
    }

    #[tokio::test]
    async fn test_rolling_average_uses_available_rows() {
        let mut fixture = Fixture::new().await;
        for ms in [100, 200, 300] {
            fixture.record(HealthState::Up, Some(ms)).await;
        }

        assert_eq!(fixture.history.rolling_average(fixture.endpoint.id, 10).await.unwrap(), Some(200));
    }

    #[tokio::test]
    async fn test_rolling_average_over_most_recent_window() {
        let mut fixture = Fixture::new().await;
        for ms in (10..=100).step_by(10) {
            fixture.record(HealthState::Up, Some(ms)).await;
        }
        let id = fixture.endpoint.id;

        assert_eq!(fixture.history.rolling_average(id, 10).await.unwrap(), Some(55));
        assert_eq!(fixture.history.rolling_average(id, 5).await.unwrap(), Some(80));
        assert_eq!(fixture.history.rolling_average(id, 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rolling_average_skips_missing_response_times() {
        let mut fixture = Fixture::new().await;
        fixture.record(HealthState::Up, Some(100)).await;
        fixture.record(HealthState::Up, Some(300)).await;
        fixture.record(HealthState::Down, None).await;

        // Newest two with a value are 300 and 100
        assert_eq!(fixture.history.rolling_average(fixture.endpoint.id, 2).await.unwrap(), Some(200));
    }

    #[tokio::test]
    async fn test_recent_history_is_oldest_first_and_bounded() {
        let mut fixture = Fixture::new().await;
        let states = [HealthState::Up, HealthState::Down, HealthState::Slow, HealthState::Up, HealthState::Timeout];
        for state in states {
            fixture.record(state, Some(10)).await;
        }

        let history = fixture.history.recent_history(fixture.endpoint.id, 3).await.unwrap();
        let got: Vec<HealthState> = history.iter().map(|e| e.state).collect();
        assert_eq!(got, vec![HealthState::Slow, HealthState::Up, HealthState::Timeout]);
        assert!(history.windows(2).all(|w| w[0].checked_at < w[1].checked_at));
        assert_eq!(window_uptime(&history), Some(33));
    }

    #[tokio::test]
    async fn test_statistics_over_full_history() {
        let mut fixture = Fixture::new().await;
        fixture.record(HealthState::Up, Some(100)).await;
        fixture.record(HealthState::Up, Some(150)).await;
        fixture.record(HealthState::Timeout, Some(5000)).await;
        fixture.record(HealthState::Down, None).await;

        let stats = fixture.history.statistics(fixture.endpoint.id).await.unwrap();
        assert_eq!(stats.total_checks, 4);
        assert_eq!(stats.successful_checks, 2);
        assert_eq!(stats.uptime_percentage, Some(50.0));
        assert_eq!(stats.uptime_label(), "50.00%");
        assert_eq!(stats.avg_response_time_ms, Some(1750));
        assert_eq!(stats.min_response_time_ms, Some(100));
        assert_eq!(stats.max_response_time_ms, Some(5000));
        assert_eq!(stats.last_5_avg_response_time_ms, Some(1750));
    }

    #[tokio::test]
    async fn test_overview_of_fresh_endpoint() {
        let fixture = Fixture::new().await;

        let overview = fixture.history.overview(fixture.endpoint.clone()).await.unwrap();
        assert!(overview.latest_check.is_none());
        assert!(overview.recent_history.is_empty());
        assert_eq!(overview.last_10_avg_response_time_ms, None);
        assert_eq!(overview.recent_uptime_percentage, None);
    }

    #[tokio::test]
    async fn test_check_history_pagination() {
        let mut fixture = Fixture::new().await;
        for ms in 1..=45 {
            fixture.record(HealthState::Up, Some(ms)).await;
        }
        let id = fixture.endpoint.id;

        let first = fixture.history.check_history(id, 1, 20).await.unwrap();
        assert_eq!(first.pagination, Pagination { total: 45, page: 1, limit: 20, total_pages: 3 });
        assert_eq!(first.checks.len(), 20);
        assert_eq!(first.checks[0].response_time_ms, Some(45));

        let last = fixture.history.check_history(id, 3, 20).await.unwrap();
        assert_eq!(last.checks.len(), 5);
        assert_eq!(last.checks[4].response_time_ms, Some(1));

        let clamped = fixture.history.check_history(id, 0, 0).await.unwrap();
        assert_eq!(clamped.pagination.page, 1);
        assert_eq!(clamped.pagination.limit, 1);

        assert!(matches!(
            fixture.history.check_history(9999, 1, 20).await,
            Err(MonitorError::EndpointNotFound(9999))
        ));
    }
}
