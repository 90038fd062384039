use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{ChurchProfile, Event, NewsItem};

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has the database locked
    #[error("The content cache is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Row Types
// ============================================================================

fn instant_from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

/// `events` row. The on-duty roster is kept as a JSON array and the date as
/// epoch milliseconds.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub(crate) struct EventRow {
    pub id: String,
    pub title: String,
    pub date_ms: i64,
    pub category: String,
    pub location: String,
    pub description: String,
    pub topic: String,
    pub scripture_reference: String,
    pub responsible_person: String,
    pub assigned_persons: String,
    pub is_featured: bool,
}

impl EventRow {
    pub(crate) fn from_event(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            date_ms: event.date.timestamp_millis(),
            category: event.category.clone(),
            location: event.location.clone(),
            description: event.description.clone(),
            topic: event.topic.clone(),
            scripture_reference: event.scripture_reference.clone(),
            responsible_person: event.responsible_person.clone(),
            assigned_persons: serde_json::to_string(&event.assigned_persons)
                .unwrap_or_else(|_| "[]".to_string()),
            is_featured: event.is_featured,
        }
    }

    pub(crate) fn into_event(self) -> Event {
        let assigned_persons = if self.assigned_persons.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&self.assigned_persons).unwrap_or_else(|e| {
                tracing::warn!(id = %self.id, error = %e, "Corrupt on-duty roster in cache, dropping it");
                Vec::new()
            })
        };

        Event {
            id: self.id,
            title: self.title,
            date: instant_from_millis(self.date_ms),
            category: self.category,
            location: self.location,
            description: self.description,
            topic: self.topic,
            scripture_reference: self.scripture_reference,
            responsible_person: self.responsible_person,
            assigned_persons,
            is_featured: self.is_featured,
        }
    }
}

/// `news_items` row. The publish date is kept as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub(crate) struct NewsRow {
    pub id: String,
    pub headline: String,
    pub publish_date_ms: i64,
    pub author: String,
    pub body: String,
    pub category: String,
    pub scripture_reference: String,
    pub is_urgent: bool,
    pub photo_url: String,
    pub related_event_id: Option<String>,
}

impl NewsRow {
    pub(crate) fn from_news_item(item: &NewsItem) -> Self {
        Self {
            id: item.id.clone(),
            headline: item.headline.clone(),
            publish_date_ms: item.publish_date.timestamp_millis(),
            author: item.author.clone(),
            body: item.body.clone(),
            category: item.category.clone(),
            scripture_reference: item.scripture_reference.clone(),
            is_urgent: item.is_urgent,
            photo_url: item.photo_url.clone(),
            related_event_id: item.related_event_id.clone(),
        }
    }

    pub(crate) fn into_news_item(self) -> NewsItem {
        NewsItem {
            id: self.id,
            headline: self.headline,
            publish_date: instant_from_millis(self.publish_date_ms),
            author: self.author,
            body: self.body,
            category: self.category,
            scripture_reference: self.scripture_reference,
            is_urgent: self.is_urgent,
            photo_url: self.photo_url,
            related_event_id: self.related_event_id,
        }
    }
}

/// `church_profile` row. The table only ever holds id `'default'`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub(crate) struct ProfileRow {
    pub id: String,
    pub name: String,
    pub logo_url: String,
    pub welcome_message: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub email: String,
    pub mission: String,
    pub service_times: String,
    pub social_link: String,
}

impl ProfileRow {
    pub(crate) const SINGLETON_ID: &'static str = "default";

    pub(crate) fn from_profile(profile: &ChurchProfile) -> Self {
        Self {
            id: Self::SINGLETON_ID.to_string(),
            name: profile.name.clone(),
            logo_url: profile.logo_url.clone(),
            welcome_message: profile.welcome_message.clone(),
            address: profile.address.clone(),
            phone: profile.phone.clone(),
            website: profile.website.clone(),
            email: profile.email.clone(),
            mission: profile.mission.clone(),
            service_times: profile.service_times.clone(),
            social_link: profile.social_link.clone(),
        }
    }

    pub(crate) fn into_profile(self) -> ChurchProfile {
        ChurchProfile {
            name: self.name,
            logo_url: self.logo_url,
            welcome_message: self.welcome_message,
            address: self.address,
            phone: self.phone,
            website: self.website,
            email: self.email,
            mission: self.mission,
            service_times: self.service_times,
            social_link: self.social_link,
        }
    }
}
