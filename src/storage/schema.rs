use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Migration` if the schema could not be brought
    /// up to date, `DatabaseError::Other` for connection-level failures.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release
        // before returning SQLITE_BUSY. Using pragma() ensures all connections
        // in the pool inherit this setting.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::Other)?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::Other)?;
        let db = Self { pool };
        db.migrate()
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(db)
    }

    /// Close the underlying pool. Any operation issued afterwards fails,
    /// which tests use to simulate an unrecoverable storage fault.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All schema changes are wrapped in a single transaction so a failing
    /// step (disk full, power loss) leaves the database in its previous
    /// consistent state. All statements use `IF NOT EXISTS` for idempotency.
    async fn migrate(&self) -> Result<()> {
        // Enable foreign keys (must be outside transaction, per-connection setting)
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        // Category hierarchy. parent_id = -1 (NO_PARENT_CATEGORY) means the
        // category is a direct child of the root. The UNIQUE constraint is
        // what makes title collisions detectable during tree merges.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                parent_id INTEGER NOT NULL DEFAULT -1,
                title TEXT NOT NULL,
                UNIQUE(parent_id, title)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // kind holds the feed-format discriminant (Atom 1.0, RDF, RSS 0.x,
        // RSS 2.x); unknown values are skipped during tree assembly.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                category_id INTEGER NOT NULL DEFAULT -1,
                title TEXT NOT NULL,
                url TEXT UNIQUE NOT NULL,
                kind INTEGER NOT NULL,
                update_mode INTEGER NOT NULL DEFAULT 0,
                update_interval INTEGER NOT NULL DEFAULT 15
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // is_pdeleted = 1 implies is_deleted = 1: permanent deletion keeps the
        // row but hides it from both the message list and the recycle bin.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                date_created INTEGER NOT NULL,
                contents TEXT NOT NULL DEFAULT '',
                is_read INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                is_pdeleted INTEGER NOT NULL DEFAULT 0,
                is_important INTEGER NOT NULL DEFAULT 0,
                attachments TEXT,
                account_id INTEGER NOT NULL DEFAULT 0,
                custom_id TEXT NOT NULL DEFAULT '',
                custom_hash TEXT NOT NULL DEFAULT ''
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_feed ON messages(feed_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(date_created DESC)",
        )
        .execute(&mut *tx)
        .await?;
        // Covering index for the grouped unread/total count refresh
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_feed_flags ON messages(feed_id, is_deleted, is_pdeleted, is_read)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
