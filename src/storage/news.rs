use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use sqlx::QueryBuilder;

use super::changes::{observe, Table};
use super::schema::Database;
use super::types::{DatabaseError, NewsRow};
use crate::model::NewsItem;

const NEWS_COLUMNS: &str = "id, headline, publish_date_ms, author, body, category, \
     scripture_reference, is_urgent, photo_url, related_event_id";

const BATCH_SIZE: usize = 50;

fn into_news(rows: Vec<NewsRow>) -> Vec<NewsItem> {
    rows.into_iter().map(NewsRow::into_news_item).collect()
}

impl Database {
    // ========================================================================
    // News Operations
    // ========================================================================

    /// All cached news items, newest first.
    pub async fn get_news_items(&self) -> Result<Vec<NewsItem>, DatabaseError> {
        let rows: Vec<NewsRow> = sqlx::query_as(&format!(
            "SELECT {NEWS_COLUMNS} FROM news_items ORDER BY publish_date_ms DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(into_news(rows))
    }

    pub async fn get_news_item(&self, id: &str) -> Result<Option<NewsItem>, DatabaseError> {
        let row: Option<NewsRow> = sqlx::query_as(&format!(
            "SELECT {NEWS_COLUMNS} FROM news_items WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(NewsRow::into_news_item))
    }

    pub async fn get_news_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<NewsItem>, DatabaseError> {
        let rows: Vec<NewsRow> = sqlx::query_as(&format!(
            "SELECT {NEWS_COLUMNS} FROM news_items WHERE category = ? COLLATE NOCASE \
             ORDER BY publish_date_ms DESC, id ASC"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(into_news(rows))
    }

    pub async fn get_urgent_news(&self) -> Result<Vec<NewsItem>, DatabaseError> {
        let rows: Vec<NewsRow> = sqlx::query_as(&format!(
            "SELECT {NEWS_COLUMNS} FROM news_items WHERE is_urgent = 1 \
             ORDER BY publish_date_ms DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(into_news(rows))
    }

    /// News published within `[start, end]` (both inclusive), newest first.
    pub async fn get_news_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>, DatabaseError> {
        let rows: Vec<NewsRow> = sqlx::query_as(&format!(
            "SELECT {NEWS_COLUMNS} FROM news_items \
             WHERE publish_date_ms BETWEEN ? AND ? \
             ORDER BY publish_date_ms DESC, id ASC"
        ))
        .bind(start.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;
        Ok(into_news(rows))
    }

    /// Replace the whole news table with `items` in one transaction.
    pub async fn replace_news_items(&self, items: &[NewsItem]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM news_items")
            .execute(&mut *tx)
            .await?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(format!(
                "INSERT OR REPLACE INTO news_items ({NEWS_COLUMNS}) "
            ));

            builder.push_values(chunk.iter().map(NewsRow::from_news_item), |mut b, row| {
                b.push_bind(row.id)
                    .push_bind(row.headline)
                    .push_bind(row.publish_date_ms)
                    .push_bind(row.author)
                    .push_bind(row.body)
                    .push_bind(row.category)
                    .push_bind(row.scripture_reference)
                    .push_bind(row.is_urgent)
                    .push_bind(row.photo_url)
                    .push_bind(row.related_event_id);
            });

            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        self.changes.notify(Table::News);
        tracing::debug!(count = items.len(), "Replaced cached news items");
        Ok(())
    }

    pub async fn delete_all_news_items(&self) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM news_items")
            .execute(&self.pool)
            .await?;
        self.changes.notify(Table::News);
        Ok(())
    }

    pub fn observe_news_items(&self) -> BoxStream<'static, Result<Vec<NewsItem>, DatabaseError>> {
        let db = self.clone();
        observe(self.changes.subscribe(Table::News), move || {
            let db = db.clone();
            async move { db.get_news_items().await }
        })
    }
}
