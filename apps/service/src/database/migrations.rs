use anyhow::Result;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 1;

/// Run database migrations
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

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::debug!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Nodes and checks").await?;
    }

    tracing::info!("Database migrations completed (now at version {})", SCHEMA_VERSION);
    Ok(())
}

async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: nodes and their check log
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS nodes (
            id TEXT PRIMARY KEY,
            network TEXT NOT NULL,
            url TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'not_checked',
            height INTEGER,
            check_history TEXT NOT NULL DEFAULT '[]',
            checked_at INTEGER,
            last_ok_at INTEGER,
            created_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS checks (
            id TEXT PRIMARY KEY,
            node_id TEXT NOT NULL,
            network TEXT NOT NULL,
            url TEXT NOT NULL,
            proxy TEXT,
            status TEXT NOT NULL,
            elapsed REAL NOT NULL,
            response TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_nodes_network ON nodes(network)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_nodes_checked_at ON nodes(checked_at)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_nodes_last_ok_at ON nodes(last_ok_at)", ()).await?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_checks_network ON checks(network)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_checks_created_at ON checks(created_at DESC)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_checks_expires_at ON checks(expires_at)", ()).await?;

    Ok(())
}
