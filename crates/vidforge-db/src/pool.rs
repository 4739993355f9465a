//! Database connection pool management.
//!
//! SQLite connections pooled with r2d2. Every connection gets foreign key
//! enforcement; file-backed pools also switch to WAL so readers never block
//! the single writer.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use vidforge_common::{Error, Result};

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const POOL_SIZE: u32 = 4;

/// Initialize a database pool backed by a file on disk.
///
/// Creates the SQLite file if it does not exist and runs pending migrations.
///
/// # Example
///
/// ```no_run
/// use vidforge_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/vidforge/db.sqlite3").unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;",
        )
    });

    build_and_migrate(manager)
}

/// Initialize an in-memory database pool (useful for tests).
///
/// Each call creates a uniquely-named shared-cache in-memory database, so
/// separate pools never see each other while all connections of one pool
/// share the same data.
///
/// # Example
///
/// ```
/// use vidforge_db::pool::{init_memory_pool, get_conn};
///
/// let pool = init_memory_pool().unwrap();
/// let conn = get_conn(&pool).unwrap();
/// ```
pub fn init_memory_pool() -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:vidforge_mem_{}_{n}?mode=memory&cache=shared", std::process::id());

    let manager = SqliteConnectionManager::file(uri)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    build_and_migrate(manager)
}

fn build_and_migrate(manager: SqliteConnectionManager) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {e}")))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("Failed to get connection for migrations: {e}")))?;

    migrations::run_migrations(&conn)?;

    Ok(pool)
}

/// Get a connection from the pool.
///
/// Converts the r2d2 error into the common Error type.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_memory_pool() {
        let pool = init_memory_pool().unwrap();
        assert_eq!(pool.max_size(), POOL_SIZE);
    }

    #[test]
    fn test_get_conn() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_connections_share_memory_database() {
        let pool = init_memory_pool().unwrap();
        let first = get_conn(&pool).unwrap();
        let second = get_conn(&pool).unwrap();

        first
            .execute(
                "INSERT INTO users (username, password_hash, joined_at) VALUES (?, ?, ?)",
                rusqlite::params!["shared", "hash", "2024-01-01T00:00:00Z"],
            )
            .unwrap();

        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_memory_pools_are_isolated() {
        let a = init_memory_pool().unwrap();
        let b = init_memory_pool().unwrap();

        get_conn(&a)
            .unwrap()
            .execute(
                "INSERT INTO users (username, password_hash, joined_at) VALUES ('x', 'h', 'now')",
                [],
            )
            .unwrap();

        let count: i64 = get_conn(&b)
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_file_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite3");
        let pool = init_pool(&path.to_string_lossy()).unwrap();
        assert!(path.exists());

        let version = crate::migrations::current_version(&get_conn(&pool).unwrap()).unwrap();
        assert_eq!(version, crate::migrations::latest_version());
    }
}
