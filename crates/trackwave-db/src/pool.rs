//! Database connection pool management.
//!
//! Connection pooling for SQLite using r2d2. Migrations run when a pool is
//! created.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use trackwave_common::{Error, Result};

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const INIT_SQL: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// Initialize a new database pool with the given file path.
///
/// Creates the database file if needed, enables WAL so readers do not block
/// the writer, and applies pending migrations.
///
/// # Example
///
/// ```no_run
/// use trackwave_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/trackwave/trackwave.db").unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch(INIT_SQL));

    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    let conn = get_conn(&pool)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")
        .map_err(|e| Error::database(format!("Failed to enable WAL: {}", e)))?;
    migrate(&conn)?;

    Ok(pool)
}

/// Initialize an in-memory database pool for testing.
///
/// Every SQLite in-memory connection is its own database, so the pool holds
/// exactly one connection. Never hold a connection while asking for another.
///
/// # Example
///
/// ```
/// use trackwave_db::pool::init_memory_pool;
///
/// let pool = init_memory_pool().unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(|conn| conn.execute_batch(INIT_SQL));

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create in-memory pool: {}", e)))?;

    migrate(&*get_conn(&pool)?)?;

    Ok(pool)
}

fn migrate(conn: &rusqlite::Connection) -> Result<()> {
    let applied = migrations::run_migrations(conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;
    if applied > 0 {
        tracing::info!(
            applied,
            version = migrations::latest_version(),
            "Applied database migrations"
        );
    }
    Ok(())
}

/// Get a connection from the pool.
///
/// # Example
///
/// ```
/// use trackwave_db::pool::{get_conn, init_memory_pool};
///
/// let pool = init_memory_pool().unwrap();
/// let conn = get_conn(&pool).unwrap();
/// ```
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_memory_pool() {
        let pool = init_memory_pool().unwrap();
        assert_eq!(pool.max_size(), 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_migrations_run_on_init() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='tracks'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_file_pool_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let path_str = path.to_str().unwrap();

        {
            let pool = init_pool(path_str).unwrap();
            let conn = get_conn(&pool).unwrap();
            conn.execute(
                "INSERT INTO listener_plays (listener, plays) VALUES ('alice', 3)",
                [],
            )
            .unwrap();
        }

        let pool = init_pool(path_str).unwrap();
        let conn = get_conn(&pool).unwrap();
        let plays: i64 = conn
            .query_row(
                "SELECT plays FROM listener_plays WHERE listener = 'alice'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(plays, 3);
    }
}
