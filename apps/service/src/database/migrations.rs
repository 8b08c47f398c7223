use anyhow::Result;
use libsql::Connection;

struct Migration {
    version: i32,
    description: &'static str,
    statements: &'static [&'static str],
}

/// Applied in order. Append new versions, never edit released ones.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Endpoints and their append-only check results",
        statements: &[
            "CREATE TABLE IF NOT EXISTS endpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS check_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                endpoint_id INTEGER NOT NULL,
                status_code INTEGER,
                response_time_ms INTEGER,
                is_up INTEGER NOT NULL,
                state TEXT NOT NULL,
                checked_at INTEGER NOT NULL,
                FOREIGN KEY (endpoint_id) REFERENCES endpoints(id) ON DELETE CASCADE
            )",
        ],
    },
    Migration {
        version: 2,
        description: "Index check results by endpoint and time",
        statements: &[
            "CREATE INDEX IF NOT EXISTS idx_check_results_endpoint_time
                ON check_results (endpoint_id, checked_at DESC, id DESC)",
            "CREATE INDEX IF NOT EXISTS idx_endpoints_owner ON endpoints (owner_id)",
        ],
    },
];

/// Bring the schema up to the latest version. Safe to run on every start.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current = applied_version(conn).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        tracing::debug!(version = current, "Database schema is up to date");
        return Ok(());
    }

    for migration in pending {
        // One transaction per version so a failed step leaves the previous version intact
        let tx = conn.transaction().await?;
        for statement in migration.statements {
            tx.execute(statement, ()).await?;
        }
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
            libsql::params![
                migration.version,
                chrono::Utc::now().timestamp_millis(),
                migration.description
            ],
        )
        .await?;
        tx.commit().await?;

        tracing::info!(version = migration.version, "Applied migration: {}", migration.description);
    }

    Ok(())
}

async fn applied_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    match rows.next().await? {
        Some(row) => Ok(row.get::<Option<i32>>(0)?.unwrap_or(0)),
        None => Ok(0),
    }
}
