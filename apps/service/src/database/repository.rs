use async_trait::async_trait;
use chrono::Utc;
use libsql::{Row, params};

use super::models::{
    CheckAggregates, CheckResult, Endpoint, NewCheckResult, NewEndpoint, millis_to_timestamp,
    timestamp_to_millis,
};
use crate::error::StorageError;
use crate::pool::LibsqlPool;

/// Database trait for abstracting the persistence collaborator
///
/// Check results are append-only and totally ordered by `checked_at`, ties
/// broken by insertion order (`id`).
#[async_trait]
pub trait Database: Send + Sync {
    /// Get every registered endpoint
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, StorageError>;

    /// Get an endpoint by id
    async fn get_endpoint(&self, id: i64) -> Result<Option<Endpoint>, StorageError>;

    /// Register an endpoint
    async fn create_endpoint(&self, endpoint: &NewEndpoint) -> Result<Endpoint, StorageError>;

    /// Delete an endpoint and, by cascade, its checks. Returns whether it existed.
    async fn delete_endpoint(&self, id: i64) -> Result<bool, StorageError>;

    /// Append one check result
    async fn insert_check_result(&self, result: &NewCheckResult) -> Result<i64, StorageError>;

    /// Most recent checks for an endpoint, newest first
    async fn query_recent_checks(
        &self,
        endpoint_id: i64,
        limit: usize,
    ) -> Result<Vec<CheckResult>, StorageError> {
        self.query_checks_page(endpoint_id, limit, 0).await
    }

    /// Newest check of an endpoint, if any
    async fn latest_check(&self, endpoint_id: i64) -> Result<Option<CheckResult>, StorageError> {
        Ok(self.query_recent_checks(endpoint_id, 1).await?.into_iter().next())
    }

    /// A page of checks for an endpoint, newest first
    async fn query_checks_page(
        &self,
        endpoint_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CheckResult>, StorageError>;

    /// Number of checks recorded for an endpoint
    async fn count_checks(&self, endpoint_id: i64) -> Result<u64, StorageError>;

    /// Response times of the most recent checks that recorded one, newest first
    async fn recent_response_times(
        &self,
        endpoint_id: i64,
        limit: usize,
    ) -> Result<Vec<u64>, StorageError>;

    /// Aggregates over the full history of an endpoint
    async fn check_statistics(&self, endpoint_id: i64) -> Result<CheckAggregates, StorageError>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>, StorageError> {
        Ok(self.pool.get().await?)
    }
}

fn endpoint_from_row(row: &Row) -> Result<Endpoint, StorageError> {
    Ok(Endpoint {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        created_at: millis_to_timestamp(row.get(4)?),
    })
}

fn check_from_row(row: &Row) -> Result<CheckResult, StorageError> {
    let state: String = row.get(5)?;
    let state = state.parse().map_err(|e| StorageError::Malformed(format!("{e}")))?;

    Ok(CheckResult {
        id: row.get(0)?,
        endpoint_id: row.get(1)?,
        status_code: row.get::<Option<i64>>(2)?.map(|v| v as u16),
        response_time_ms: row.get::<Option<i64>>(3)?.map(|v| v as u64),
        is_up: row.get::<i64>(4)? != 0,
        state,
        checked_at: millis_to_timestamp(row.get(6)?),
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, StorageError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT id, owner_id, name, url, created_at FROM endpoints ORDER BY id", ())
            .await?;

        let mut endpoints = Vec::new();
        while let Some(row) = rows.next().await? {
            endpoints.push(endpoint_from_row(&row)?);
        }

        Ok(endpoints)
    }

    async fn get_endpoint(&self, id: i64) -> Result<Option<Endpoint>, StorageError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, owner_id, name, url, created_at FROM endpoints WHERE id = ?",
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(endpoint_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_endpoint(&self, endpoint: &NewEndpoint) -> Result<Endpoint, StorageError> {
        let conn = self.get_conn().await?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO endpoints (owner_id, name, url, created_at) VALUES (?, ?, ?, ?)",
            params![
                endpoint.owner_id,
                endpoint.name.clone(),
                endpoint.url.clone(),
                timestamp_to_millis(created_at)
            ],
        )
        .await?;

        Ok(Endpoint {
            id: conn.last_insert_rowid(),
            owner_id: endpoint.owner_id,
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            // Round-trip through storage precision so reads compare equal
            created_at: millis_to_timestamp(timestamp_to_millis(created_at)),
        })
    }

    async fn delete_endpoint(&self, id: i64) -> Result<bool, StorageError> {
        let conn = self.get_conn().await?;

        // Check results are removed via ON DELETE CASCADE
        let deleted = conn.execute("DELETE FROM endpoints WHERE id = ?", params![id]).await?;
        Ok(deleted > 0)
    }

    async fn insert_check_result(&self, result: &NewCheckResult) -> Result<i64, StorageError> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO check_results (endpoint_id, status_code, response_time_ms, is_up, state, checked_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                result.endpoint_id,
                result.status_code.map(|v| v as i64),
                result.response_time_ms.map(|v| v as i64),
                if result.is_up { 1 } else { 0 },
                result.state.as_str(),
                timestamp_to_millis(result.checked_at)
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn query_checks_page(
        &self,
        endpoint_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CheckResult>, StorageError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, endpoint_id, status_code, response_time_ms, is_up, state, checked_at FROM check_results WHERE endpoint_id = ? ORDER BY checked_at DESC, id DESC LIMIT ? OFFSET ?",
                params![endpoint_id, limit as i64, offset as i64],
            )
            .await?;

        let mut checks = Vec::new();
        while let Some(row) = rows.next().await? {
            checks.push(check_from_row(&row)?);
        }

        Ok(checks)
    }

    async fn count_checks(&self, endpoint_id: i64) -> Result<u64, StorageError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM check_results WHERE endpoint_id = ?", params![endpoint_id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    async fn recent_response_times(
        &self,
        endpoint_id: i64,
        limit: usize,
    ) -> Result<Vec<u64>, StorageError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT response_time_ms FROM check_results WHERE endpoint_id = ? AND response_time_ms IS NOT NULL ORDER BY checked_at DESC, id DESC LIMIT ?",
                params![endpoint_id, limit as i64],
            )
            .await?;

        let mut times = Vec::new();
        while let Some(row) = rows.next().await? {
            times.push(row.get::<i64>(0)? as u64);
        }

        Ok(times)
    }

    async fn check_statistics(&self, endpoint_id: i64) -> Result<CheckAggregates, StorageError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_up = 1 THEN 1 ELSE 0 END), 0), AVG(response_time_ms), MIN(response_time_ms), MAX(response_time_ms) FROM check_results WHERE endpoint_id = ?",
                params![endpoint_id],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(CheckAggregates::default());
        };

        Ok(CheckAggregates {
            total_checks: row.get::<i64>(0)? as u64,
            successful_checks: row.get::<i64>(1)? as u64,
            avg_response_time_ms: row.get::<Option<f64>>(2)?,
            min_response_time_ms: row.get::<Option<i64>>(3)?.map(|v| v as u64),
            max_response_time_ms: row.get::<Option<i64>>(4)?.map(|v| v as u64),
        })
    }
}
