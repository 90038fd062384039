use futures::stream::BoxStream;

use super::changes::{observe, Table};
use super::schema::Database;
use super::types::DatabaseError;

impl Database {
    // ========================================================================
    // Settings Operations
    // ========================================================================

    /// Get a single setting by key.
    ///
    /// Keys use dotted convention: `sheet.url`, `filter.categories`.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a setting value (UPSERT).
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        self.changes.notify(Table::Settings);
        Ok(())
    }

    pub async fn delete_setting(&self, key: &str) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        self.changes.notify(Table::Settings);
        Ok(())
    }

    /// Get all settings whose key starts with `prefix`, ordered by key.
    ///
    /// `_` and `%` in the prefix are matched literally.
    pub async fn get_settings_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, DatabaseError> {
        let escaped = prefix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("{}%", escaped);
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM settings WHERE key LIKE ? ESCAPE '\\' ORDER BY key",
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn clear_settings(&self) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM settings").execute(&self.pool).await?;
        self.changes.notify(Table::Settings);
        Ok(())
    }

    /// Live value of one key. Emits the current value immediately and again
    /// whenever any setting is written, so consecutive equal values are possible.
    pub fn observe_setting(
        &self,
        key: &str,
    ) -> BoxStream<'static, Result<Option<String>, DatabaseError>> {
        let db = self.clone();
        let key = key.to_string();
        observe(self.changes.subscribe(Table::Settings), move || {
            let db = db.clone();
            let key = key.clone();
            async move { db.get_setting(&key).await }
        })
    }
}
