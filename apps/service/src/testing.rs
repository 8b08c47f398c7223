//! In-memory doubles for the network and persistence collaborators.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tokio::sync::{Notify, Semaphore};

use crate::database::{Database, DatabaseImpl, initialize_database};
use crate::database::models::{
    CheckAggregates, CheckResult, Endpoint, NewCheckResult, NewEndpoint,
};
use crate::error::{ProbeError, StorageError};
use crate::monitoring::checker::{ProbeResponse, Prober};
use crate::pool::open_pool;

/// Migrated SQLite database in a temporary directory. Keep the `TempDir` alive.
pub async fn sqlite_database() -> (DatabaseImpl, TempDir) {
    let temp_dir = tempdir().unwrap();
    let pool = open_pool(temp_dir.path().join("test.db"), 4).await.unwrap();
    let conn = pool.get().await.unwrap();
    initialize_database(&conn).await.unwrap();
    drop(conn);
    (DatabaseImpl::new_from_pool(pool), temp_dir)
}

pub fn endpoint(id: i64, url: &str) -> Endpoint {
    Endpoint {
        id,
        owner_id: 1,
        name: format!("endpoint-{id}"),
        url: url.to_string(),
        created_at: Utc::now(),
    }
}

#[derive(Clone)]
enum Script {
    Respond(ProbeResponse),
    Fail(ProbeError),
    Panic,
}

/// Prober answering from a per-URL script. Unknown URLs get a connection error.
#[derive(Default)]
pub struct ScriptedProber {
    scripts: HashMap<String, Script>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    entered: Arc<Notify>,
    active: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

impl ScriptedProber {
    pub fn respond(mut self, url: &str, status_code: u16, elapsed_ms: u64) -> Self {
        self.scripts
            .insert(url.to_string(), Script::Respond(ProbeResponse { status_code, elapsed_ms }));
        self
    }

    pub fn fail(mut self, url: &str, error: ProbeError) -> Self {
        self.scripts.insert(url.to_string(), Script::Fail(error));
        self
    }

    pub fn panic_on(mut self, url: &str) -> Self {
        self.scripts.insert(url.to_string(), Script::Panic);
        self
    }

    /// Every probe sleeps this long (tokio time) before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every probe waits for a permit on `gate` before answering
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Notified each time a probe starts
    pub fn entered(&self) -> Arc<Notify> {
        self.entered.clone()
    }

    /// Highest number of probes observed running at once
    pub fn peak(&self) -> Arc<AtomicUsize> {
        self.peak.clone()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<ProbeResponse, ProbeError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        self.entered.notify_one();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        match self.scripts.get(url).cloned() {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Fail(error)) => Err(error),
            Some(Script::Panic) => panic!("scripted probe panic for {url}"),
            None => Err(ProbeError::Connection { elapsed_ms: 0, message: format!("no script for {url}") }),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    endpoints: Vec<Endpoint>,
    checks: Vec<CheckResult>,
    next_id: i64,
}

/// Database keeping everything in a vector, with injectable write failures
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
    failing_inserts: HashSet<i64>,
    failing_list: bool,
}

impl MemoryDatabase {
    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        let db = Self::default();
        db.state.lock().unwrap().endpoints = endpoints;
        db
    }

    pub fn failing_inserts_for(mut self, endpoint_id: i64) -> Self {
        self.failing_inserts.insert(endpoint_id);
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.failing_list = true;
        self
    }

    /// Rows for one endpoint in insertion order
    pub fn checks_for(&self, endpoint_id: i64) -> Vec<CheckResult> {
        let state = self.state.lock().unwrap();
        state.checks.iter().filter(|c| c.endpoint_id == endpoint_id).cloned().collect()
    }

    pub fn total_checks(&self) -> usize {
        self.state.lock().unwrap().checks.len()
    }

    fn sorted_checks(&self, endpoint_id: i64) -> Vec<CheckResult> {
        let mut checks = self.checks_for(endpoint_id);
        checks.sort_by(|a, b| b.checked_at.cmp(&a.checked_at).then(b.id.cmp(&a.id)));
        checks
    }
}

fn write_failure() -> StorageError {
    StorageError::Malformed("injected write failure".to_string())
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, StorageError> {
        if self.failing_list {
            return Err(write_failure());
        }
        Ok(self.state.lock().unwrap().endpoints.clone())
    }

    async fn get_endpoint(&self, id: i64) -> Result<Option<Endpoint>, StorageError> {
        Ok(self.state.lock().unwrap().endpoints.iter().find(|e| e.id == id).cloned())
    }

    async fn create_endpoint(&self, endpoint: &NewEndpoint) -> Result<Endpoint, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let created = Endpoint {
            id: 1000 + state.next_id,
            owner_id: endpoint.owner_id,
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            created_at: Utc::now(),
        };
        state.endpoints.push(created.clone());
        Ok(created)
    }

    async fn delete_endpoint(&self, id: i64) -> Result<bool, StorageError> {
        let mut state = self.state.lock().unwrap();
        let before = state.endpoints.len();
        state.endpoints.retain(|e| e.id != id);
        state.checks.retain(|c| c.endpoint_id != id);
        Ok(state.endpoints.len() != before)
    }

    async fn insert_check_result(&self, result: &NewCheckResult) -> Result<i64, StorageError> {
        if self.failing_inserts.contains(&result.endpoint_id) {
            return Err(write_failure());
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.checks.push(CheckResult {
            id,
            endpoint_id: result.endpoint_id,
            status_code: result.status_code,
            response_time_ms: result.response_time_ms,
            is_up: result.is_up,
            state: result.state,
            checked_at: result.checked_at,
        });
        Ok(id)
    }

    async fn query_checks_page(
        &self,
        endpoint_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CheckResult>, StorageError> {
        Ok(self.sorted_checks(endpoint_id).into_iter().skip(offset).take(limit).collect())
    }

    async fn count_checks(&self, endpoint_id: i64) -> Result<u64, StorageError> {
        Ok(self.checks_for(endpoint_id).len() as u64)
    }

    async fn recent_response_times(
        &self,
        endpoint_id: i64,
        limit: usize,
    ) -> Result<Vec<u64>, StorageError> {
        Ok(self
            .sorted_checks(endpoint_id)
            .into_iter()
            .filter_map(|c| c.response_time_ms)
            .take(limit)
            .collect())
    }

    async fn check_statistics(&self, endpoint_id: i64) -> Result<CheckAggregates, StorageError> {
        let checks = self.checks_for(endpoint_id);
        let times: Vec<u64> = checks.iter().filter_map(|c| c.response_time_ms).collect();
        Ok(CheckAggregates {
            total_checks: checks.len() as u64,
            successful_checks: checks.iter().filter(|c| c.is_up).count() as u64,
            avg_response_time_ms: (!times.is_empty())
                .then(|| times.iter().sum::<u64>() as f64 / times.len() as f64),
            min_response_time_ms: times.iter().copied().min(),
            max_response_time_ms: times.iter().copied().max(),
        })
    }
}
