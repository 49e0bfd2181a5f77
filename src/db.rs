use crate::config::DatabaseConfig;
use crate::utils::error::{AppError, AppResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

// Tables in dependency order
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS airports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        city TEXT NOT NULL,
        country TEXT NOT NULL,
        continent TEXT NOT NULL,
        city_photo_url TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'User',
        refresh_token TEXT UNIQUE,
        refresh_token_expires_at INTEGER,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS flights (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        flight_number TEXT NOT NULL UNIQUE,
        departure_airport_id INTEGER NOT NULL REFERENCES airports(id),
        arrival_airport_id INTEGER NOT NULL REFERENCES airports(id),
        departure_time INTEGER NOT NULL,
        arrival_time INTEGER NOT NULL,
        price_cents INTEGER NOT NULL,
        total_seats INTEGER NOT NULL CHECK (total_seats > 0),
        available_seats INTEGER NOT NULL,
        duration TEXT NOT NULL,
        airline TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        CHECK (available_seats >= 0 AND available_seats <= total_seats)
    )",
    "CREATE INDEX IF NOT EXISTS idx_flights_route
        ON flights (departure_airport_id, arrival_airport_id, departure_time)",
    "CREATE TABLE IF NOT EXISTS occupied_seats (
        flight_id INTEGER NOT NULL REFERENCES flights(id) ON DELETE CASCADE,
        seat TEXT NOT NULL,
        PRIMARY KEY (flight_id, seat)
    )",
    "CREATE TABLE IF NOT EXISTS reservations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        flight_id INTEGER NOT NULL REFERENCES flights(id) ON DELETE CASCADE,
        seat_numbers TEXT NOT NULL,
        seat_count INTEGER NOT NULL CHECK (seat_count > 0),
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_reservations_user ON reservations (user_id)",
];

// Database connection manager
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    // Create a new database connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.acquire_timeout);

        let pool = if config.is_in_memory() {
            // Every connection to ":memory:" is a separate database, so keep exactly one alive
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .acquire_timeout(config.acquire_timeout)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.acquire_timeout)
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };

        Ok(Database { pool })
    }

    /// Create any missing tables and indexes.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!(statements = SCHEMA.len(), "database schema ready");
        Ok(())
    }

    // Get a reference to the connection pool
    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Run a storage operation under a deadline. A dropped future rolls back any
/// open transaction, so an expired operation leaves no partial writes behind.
pub async fn with_deadline<T, F>(limit: Duration, operation: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Unavailable(format!(
            "storage operation exceeded {} ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_turns_slow_operation_into_unavailable() {
        let result: AppResult<()> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        match result {
            Err(e) => assert!(e.is_retryable()),
            Ok(_) => panic!("expected the deadline to expire"),
        }
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let db = Database::new(&DatabaseConfig::in_memory()).await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
             ('airports', 'users', 'flights', 'occupied_seats', 'reservations')",
        )
        .fetch_one(db.get_pool())
        .await
        .unwrap();
        assert_eq!(tables, 5);
    }
}
