use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use sqlx::QueryBuilder;

use super::changes::{observe, Table};
use super::schema::Database;
use super::types::{DatabaseError, EventRow};
use crate::model::Event;

const EVENT_COLUMNS: &str = "id, title, date_ms, category, location, description, topic, \
     scripture_reference, responsible_person, assigned_persons, is_featured";

/// 11 binds per row keeps each statement far below SQLite's variable limit.
const BATCH_SIZE: usize = 50;

fn into_events(rows: Vec<EventRow>) -> Vec<Event> {
    rows.into_iter().map(EventRow::into_event).collect()
}

impl Database {
    // ========================================================================
    // Event Operations
    // ========================================================================

    /// All cached events, soonest first.
    pub async fn get_events(&self) -> Result<Vec<Event>, DatabaseError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY date_ms ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(into_events(rows))
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<Event>, DatabaseError> {
        let row: Option<EventRow> =
            sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(EventRow::into_event))
    }

    /// Events whose category equals `category`, ignoring ASCII case.
    pub async fn get_events_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<Event>, DatabaseError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE category = ? COLLATE NOCASE \
             ORDER BY date_ms ASC, id ASC"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(into_events(rows))
    }

    pub async fn get_featured_events(&self) -> Result<Vec<Event>, DatabaseError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE is_featured = 1 ORDER BY date_ms ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(into_events(rows))
    }

    /// At most `limit` events strictly after `now`, soonest first.
    pub async fn get_upcoming_events(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Event>, DatabaseError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE date_ms > ? \
             ORDER BY date_ms ASC, id ASC LIMIT ?"
        ))
        .bind(now.timestamp_millis())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(into_events(rows))
    }

    /// Replace the whole events table with `events` in one transaction.
    ///
    /// Observers are notified only after the commit succeeds. Duplicate ids
    /// within `events` collapse to the last occurrence.
    pub async fn replace_events(&self, events: &[Event]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM events").execute(&mut *tx).await?;

        for chunk in events.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new(format!("INSERT OR REPLACE INTO events ({EVENT_COLUMNS}) "));

            builder.push_values(chunk.iter().map(EventRow::from_event), |mut b, row| {
                b.push_bind(row.id)
                    .push_bind(row.title)
                    .push_bind(row.date_ms)
                    .push_bind(row.category)
                    .push_bind(row.location)
                    .push_bind(row.description)
                    .push_bind(row.topic)
                    .push_bind(row.scripture_reference)
                    .push_bind(row.responsible_person)
                    .push_bind(row.assigned_persons)
                    .push_bind(row.is_featured);
            });

            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        self.changes.notify(Table::Events);
        tracing::debug!(count = events.len(), "Replaced cached events");
        Ok(())
    }

    pub async fn delete_all_events(&self) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM events").execute(&self.pool).await?;
        self.changes.notify(Table::Events);
        Ok(())
    }

    /// Live view of [`Database::get_events`]: emits now and after every write.
    pub fn observe_events(&self) -> BoxStream<'static, Result<Vec<Event>, DatabaseError>> {
        let db = self.clone();
        observe(self.changes.subscribe(Table::Events), move || {
            let db = db.clone();
            async move { db.get_events().await }
        })
    }
}
