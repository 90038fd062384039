use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::changes::{ChangeFeed, Table};
use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

/// Local content cache: one table per record kind plus a key/value settings table.
///
/// Cloning is cheap; clones share the pool and the change feed.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
    pub(crate) changes: Arc<ChangeFeed>,
}

impl Database {
    /// Open a database connection and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database that lives as long as
    /// the returned handle (and its clones).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process has the
    /// database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let in_memory = path == ":memory:";
        let url = format!("sqlite:{}?mode=rwc", path);

        // Pre-create the file user-only so it never exists with umask permissions.
        #[cfg(unix)]
        if !in_memory {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() && db_path.parent().is_some_and(|p| p.exists()) {
                let _file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path)
                    .ok(); // If creation fails, SQLite will report the error at connect_with.
            }
        }

        // busy_timeout=5000: wait up to 5 seconds for locks before SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");

        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(10));
        pool_options = if in_memory {
            // The in-memory database disappears with its last connection.
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            // SQLite is single-writer; a handful of connections covers the
            // three repositories' observers plus one refresh in flight.
            pool_options.max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let db = Self {
            pool,
            changes: Arc::new(ChangeFeed::new()),
        };
        db.migrate().await.map_err(|e| match DatabaseError::from_sqlx(e) {
            DatabaseError::InstanceLocked => DatabaseError::InstanceLocked,
            other => DatabaseError::Migration(other.to_string()),
        })?;

        tracing::debug!(path = %path, "Opened content cache");
        Ok(db)
    }

    /// Run schema migrations atomically within one transaction.
    ///
    /// Every statement uses `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY NOT NULL,
                title TEXT NOT NULL,
                date_ms INTEGER NOT NULL,
                category TEXT NOT NULL,
                location TEXT NOT NULL,
                description TEXT NOT NULL,
                topic TEXT NOT NULL,
                scripture_reference TEXT NOT NULL,
                responsible_person TEXT NOT NULL,
                assigned_persons TEXT NOT NULL DEFAULT '[]',
                is_featured INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news_items (
                id TEXT PRIMARY KEY NOT NULL,
                headline TEXT NOT NULL,
                publish_date_ms INTEGER NOT NULL,
                author TEXT NOT NULL,
                body TEXT NOT NULL,
                category TEXT NOT NULL,
                scripture_reference TEXT NOT NULL,
                is_urgent INTEGER NOT NULL DEFAULT 0,
                photo_url TEXT NOT NULL,
                related_event_id TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS church_profile (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                logo_url TEXT NOT NULL,
                welcome_message TEXT NOT NULL,
                address TEXT NOT NULL,
                phone TEXT NOT NULL,
                website TEXT NOT NULL,
                email TEXT NOT NULL,
                mission TEXT NOT NULL,
                service_times TEXT NOT NULL,
                social_link TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_date ON events(date_ms)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_category ON events(category COLLATE NOCASE)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_publish_date ON news_items(publish_date_ms DESC)",
        )
        .execute(&mut *tx)
        .await?;
        // Partial index: urgent items are a handful out of the whole feed
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_urgent ON news_items(publish_date_ms DESC) WHERE is_urgent = 1",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Wipe events, news and the profile in one transaction.
    ///
    /// Settings are untouched; see [`Database::clear_settings`].
    pub async fn clear_cache(&self) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM events").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM news_items")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM church_profile")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.changes.notify(Table::Events);
        self.changes.notify(Table::News);
        self.changes.notify(Table::Profile);
        tracing::info!("Content cache cleared");
        Ok(())
    }
}
