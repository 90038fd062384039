//! SQLite-backed content cache.
//!
//! One table per record kind, replaced wholesale on every successful refresh,
//! plus a small key/value settings table. Every committed write bumps a
//! per-table version counter so `observe_*` streams can re-query.

mod changes;
mod events;
mod news;
mod profile;
mod schema;
mod settings;
mod types;

pub use schema::Database;
pub use types::DatabaseError;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::model::{ChurchProfile, Event, NewsItem};

/// Durable list of one record kind, as consumed by a list repository.
#[async_trait]
pub trait RecordStore<T: Send + Sync + 'static>: Send + Sync {
    /// Current contents now and after every committed write.
    fn observe_all(&self) -> BoxStream<'static, Result<Vec<T>, DatabaseError>>;

    async fn get_all(&self) -> Result<Vec<T>, DatabaseError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<T>, DatabaseError>;

    /// Atomically delete every record and insert `items`.
    async fn replace_all(&self, items: &[T]) -> Result<(), DatabaseError>;

    async fn delete_all(&self) -> Result<(), DatabaseError>;
}

/// Durable singleton profile.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    fn observe(&self) -> BoxStream<'static, Result<Option<ChurchProfile>, DatabaseError>>;

    async fn get(&self) -> Result<Option<ChurchProfile>, DatabaseError>;

    /// Delete the stored profile (if any) and insert `profile`.
    async fn replace(&self, profile: &ChurchProfile) -> Result<(), DatabaseError>;

    async fn delete_all(&self) -> Result<(), DatabaseError>;
}

#[async_trait]
impl RecordStore<Event> for Database {
    fn observe_all(&self) -> BoxStream<'static, Result<Vec<Event>, DatabaseError>> {
        self.observe_events()
    }

    async fn get_all(&self) -> Result<Vec<Event>, DatabaseError> {
        self.get_events().await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Event>, DatabaseError> {
        self.get_event(id).await
    }

    async fn replace_all(&self, items: &[Event]) -> Result<(), DatabaseError> {
        self.replace_events(items).await
    }

    async fn delete_all(&self) -> Result<(), DatabaseError> {
        self.delete_all_events().await
    }
}

#[async_trait]
impl RecordStore<NewsItem> for Database {
    fn observe_all(&self) -> BoxStream<'static, Result<Vec<NewsItem>, DatabaseError>> {
        self.observe_news_items()
    }

    async fn get_all(&self) -> Result<Vec<NewsItem>, DatabaseError> {
        self.get_news_items().await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<NewsItem>, DatabaseError> {
        self.get_news_item(id).await
    }

    async fn replace_all(&self, items: &[NewsItem]) -> Result<(), DatabaseError> {
        self.replace_news_items(items).await
    }

    async fn delete_all(&self) -> Result<(), DatabaseError> {
        self.delete_all_news_items().await
    }
}

#[async_trait]
impl ProfileStore for Database {
    fn observe(&self) -> BoxStream<'static, Result<Option<ChurchProfile>, DatabaseError>> {
        self.observe_profile()
    }

    async fn get(&self) -> Result<Option<ChurchProfile>, DatabaseError> {
        self.get_profile().await
    }

    async fn replace(&self, profile: &ChurchProfile) -> Result<(), DatabaseError> {
        self.replace_profile(profile).await
    }

    async fn delete_all(&self) -> Result<(), DatabaseError> {
        self.delete_profile().await
    }
}
