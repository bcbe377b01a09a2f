pub mod categories;
pub mod comments;
pub mod follows;
pub mod lookup;
pub mod models;
pub mod notifications;
pub mod posts;
pub mod reactions;
pub mod reports;
pub mod search;
pub mod users;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Per-connection setup. Runs for every connection the pool opens, so
/// foreign keys and the busy timeout hold no matter which one a request gets.
fn connection_manager(manager: SqliteConnectionManager, busy_timeout_ms: u64) -> SqliteConnectionManager {
    manager.with_init(move |conn| {
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )
    })
}

pub fn create_pool(db_path: &Path, config: &DatabaseConfig) -> anyhow::Result<DbPool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = connection_manager(
        SqliteConnectionManager::file(db_path),
        config.busy_timeout_ms,
    );
    let pool = Pool::builder()
        .max_size(config.pool_size.max(1))
        .connection_timeout(Duration::from_millis(config.busy_timeout_ms.max(1000)))
        .build(manager)?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// In-memory pool with the schema applied. A single connection, since every
/// SQLite memory connection is its own database.
#[cfg(test)]
pub(crate) fn test_pool() -> DbPool {
    let manager = connection_manager(SqliteConnectionManager::memory(), 1000);
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    run_migrations(&pool).unwrap();
    pool
}

#[cfg(test)]
pub(crate) fn insert_test_user(conn: &rusqlite::Connection, username: &str, role_id: i64) -> i64 {
    conn.execute(
        "INSERT INTO users (first_name, last_name, username, email, password_hash, role_id)
         VALUES ('Test', 'User', ?1, ?2, 'x', ?3)",
        params![username, format!("{}@example.com", username), role_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}
