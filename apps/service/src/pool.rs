use std::path::Path;
use std::time::Duration;

use deadpool::managed::{self, Pool, RecycleResult};
use libsql::{Builder, Connection, Database, Error as LibsqlError};

/// How long a connection waits on a locked SQLite file before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LibsqlManager {
    database: Database,
}

impl LibsqlManager {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.database.connect()?;
        // Cascading deletes and concurrent writers need these on every connection
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        conn.query(&format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT.as_millis()), ()).await?;
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> RecycleResult<Self::Error> {
        conn.query("SELECT 1", ()).await?.next().await?;
        Ok(())
    }
}

pub type LibsqlPool = Pool<LibsqlManager>;

/// Open (or create) a local SQLite database and pool connections to it
pub async fn open_pool(path: impl AsRef<Path>, max_size: usize) -> anyhow::Result<LibsqlPool> {
    let database = Builder::new_local(path.as_ref()).build().await?;

    // WAL lets readers proceed while sweep tasks insert
    database.connect()?.query("PRAGMA journal_mode = WAL", ()).await?;

    let pool = Pool::builder(LibsqlManager::new(database)).max_size(max_size).build()?;
    Ok(pool)
}
