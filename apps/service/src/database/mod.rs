/// Database abstraction layer
///
/// This module provides the persistence collaborator used by the monitoring
/// engine: endpoints and their append-only check results, stored in LibSQL.

pub mod repository;
pub mod migrations;
pub mod models;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
