use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{Config, MonitoringConfig};
use crate::database::models::{Endpoint, NewEndpoint};
use crate::database::{Database, DatabaseImpl, initialize_database};
use crate::error::MonitorError;
use crate::history::{CheckHistoryPage, CheckStatistics, EndpointOverview, HistoryAggregator};
use crate::monitoring::checker::{HttpProber, Prober};
use crate::monitoring::{CheckOutcome, MonitoringExecutor, MonitoringScheduler, SweepReport};
use crate::pool::open_pool;
use crate::validation::validate_registration;

/// A freshly registered endpoint and the result of its first check
#[derive(Debug, Serialize)]
pub struct Registration {
    pub endpoint: Endpoint,
    /// `None` when the first check could not be recorded
    pub initial_check: Option<CheckOutcome>,
}

/// Wires storage, checks, scheduling and history together
pub struct MonitorService {
    database: Arc<dyn Database>,
    executor: Arc<MonitoringExecutor>,
    scheduler: Arc<MonitoringScheduler>,
    history: HistoryAggregator,
}

impl MonitorService {
    /// Open the configured database, migrate it and build the engine with a real HTTP prober
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = open_pool(&config.database.path, config.database.pool_size.max(1)).await?;
        {
            let conn = pool.get().await?;
            initialize_database(&conn).await?;
        }
        info!(path = %config.database.path.display(), "Database ready");

        let database: Arc<dyn Database> = Arc::new(DatabaseImpl::new_from_pool(pool));
        let prober: Arc<dyn Prober> = Arc::new(HttpProber::new()?);
        Ok(Self::new(database, prober, &config.monitoring))
    }

    pub fn new(database: Arc<dyn Database>, prober: Arc<dyn Prober>, config: &MonitoringConfig) -> Self {
        let executor = Arc::new(MonitoringExecutor::new(prober, database.clone(), config.request_timeout()));
        let scheduler = Arc::new(MonitoringScheduler::new(
            executor.clone(),
            database.clone(),
            config.interval(),
            config.max_concurrency,
        ));
        let history = HistoryAggregator::new(database.clone());

        Self { database, executor, scheduler, history }
    }

    pub fn history(&self) -> &HistoryAggregator {
        &self.history
    }

    /// Validate and store a new endpoint, then check it once right away.
    ///
    /// A failed first check is logged and reported as `initial_check: None`;
    /// the endpoint stays registered either way.
    pub async fn register_endpoint(
        &self,
        owner_id: i64,
        name: &str,
        url: &str,
    ) -> Result<Registration, MonitorError> {
        validate_registration(name, url).into_result()?;

        let endpoint = self
            .database
            .create_endpoint(&NewEndpoint {
                owner_id,
                name: name.trim().to_string(),
                url: url.trim().to_string(),
            })
            .await?;
        info!(endpoint_id = endpoint.id, url = %endpoint.url, "Endpoint registered");

        let initial_check = match self.executor.execute_check(&endpoint).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(endpoint_id = endpoint.id, "Initial check failed: {}", e);
                None
            }
        };

        Ok(Registration { endpoint, initial_check })
    }

    /// Delete an endpoint together with its check history
    pub async fn remove_endpoint(&self, endpoint_id: i64) -> Result<(), MonitorError> {
        if self.database.delete_endpoint(endpoint_id).await? {
            info!(endpoint_id, "Endpoint removed");
            Ok(())
        } else {
            Err(MonitorError::EndpointNotFound(endpoint_id))
        }
    }

    pub async fn run_sweep_now(&self) -> Result<SweepReport, MonitorError> {
        self.scheduler.run_sweep_now().await
    }

    /// Overview of every endpoint, optionally restricted to one owner
    pub async fn overviews(&self, owner_id: Option<i64>) -> Result<Vec<EndpointOverview>, MonitorError> {
        let endpoints = self.database.list_endpoints().await?;

        let mut overviews = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if owner_id.is_some_and(|owner| owner != endpoint.owner_id) {
                continue;
            }
            overviews.push(self.history.overview(endpoint).await?);
        }
        Ok(overviews)
    }

    pub async fn statistics(&self, endpoint_id: i64) -> Result<(Endpoint, CheckStatistics), MonitorError> {
        let endpoint = self.endpoint(endpoint_id).await?;
        let statistics = self.history.statistics(endpoint_id).await?;
        Ok((endpoint, statistics))
    }

    pub async fn check_history(
        &self,
        endpoint_id: i64,
        page: usize,
        limit: usize,
    ) -> Result<CheckHistoryPage, MonitorError> {
        self.history.check_history(endpoint_id, page, limit).await
    }

    async fn endpoint(&self, endpoint_id: i64) -> Result<Endpoint, MonitorError> {
        self.database
            .get_endpoint(endpoint_id)
            .await?
            .ok_or(MonitorError::EndpointNotFound(endpoint_id))
    }

    /// Run the scheduler until `shutdown` flips to true, then wait for the
    /// in-flight sweep
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        Arc::clone(&self.scheduler).run(shutdown).await;
    }
}
