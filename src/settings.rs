//! Persisted user settings: the spreadsheet URL and preferred categories.
//!
//! Each setting lives under its own key in the `settings` table. Changes to
//! any key wake every observer; the streams here drop consecutive duplicates.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::query::eq_ignore_case;
use crate::storage::{Database, DatabaseError};
use crate::util::{is_valid_sheet_url, validate_sheet_url, SheetUrlError};

pub const SHEET_URL_KEY: &str = "sheet.url";
pub const PREFERRED_CATEGORIES_KEY: &str = "filter.categories";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    InvalidUrl(#[from] SheetUrlError),
    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// Async accessor for the configured spreadsheet URL.
///
/// Repositories read through this on every refresh, so a new URL takes
/// effect without rebuilding them.
#[async_trait]
pub trait SheetUrlProvider: Send + Sync {
    /// The configured URL, or `None` when unset or blank.
    ///
    /// A failed read is an error, never `None`: an unreadable setting is not
    /// the same as a missing one.
    async fn sheet_url(&self) -> Result<Option<String>, DatabaseError>;
}

/// Settings store backed by the content cache database.
#[derive(Clone)]
pub struct Settings {
    db: Database,
}

impl Settings {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ========================================================================
    // Spreadsheet URL
    // ========================================================================

    /// Store `url` (trimmed) without validating it.
    pub async fn set_url(&self, url: &str) -> Result<(), DatabaseError> {
        self.db.set_setting(SHEET_URL_KEY, url.trim()).await?;
        tracing::info!("Spreadsheet URL updated");
        Ok(())
    }

    /// Validate, then store `url`. Nothing is written when validation fails.
    pub async fn set_url_validated(&self, url: &str) -> Result<(), SettingsError> {
        validate_sheet_url(url)?;
        self.set_url(url).await?;
        Ok(())
    }

    /// The stored URL; a blank stored value reads as `None`.
    pub async fn get_url(&self) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .db
            .get_setting(SHEET_URL_KEY)
            .await?
            .filter(|u| !u.trim().is_empty()))
    }

    pub fn observe_url(&self) -> BoxStream<'static, Option<String>> {
        let values = self.db.observe_setting(SHEET_URL_KEY).filter_map(|r| async move {
            match r {
                Ok(url) => Some(url.filter(|u| !u.trim().is_empty())),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read spreadsheet URL");
                    None
                }
            }
        });
        distinct(values.boxed())
    }

    pub async fn clear(&self) -> Result<(), DatabaseError> {
        self.db.delete_setting(SHEET_URL_KEY).await?;
        tracing::info!("Spreadsheet URL cleared");
        Ok(())
    }

    /// A URL is stored and passes validation.
    pub async fn is_configured(&self) -> bool {
        match self.get_url().await {
            Ok(Some(url)) => is_valid_sheet_url(&url),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read spreadsheet URL");
                false
            }
        }
    }

    // ========================================================================
    // Preferred categories
    // ========================================================================

    /// Replace the preferred categories. Blank entries are dropped.
    pub async fn save_preferred_categories(
        &self,
        categories: &BTreeSet<String>,
    ) -> Result<(), DatabaseError> {
        let cleaned: BTreeSet<&str> = categories
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        let json = serde_json::to_string(&cleaned).unwrap_or_else(|_| "[]".to_string());
        self.db.set_setting(PREFERRED_CATEGORIES_KEY, &json).await
    }

    /// The preferred categories; empty when unset or unreadable.
    pub async fn preferred_categories(&self) -> Result<BTreeSet<String>, DatabaseError> {
        let raw = self.db.get_setting(PREFERRED_CATEGORIES_KEY).await?;
        Ok(decode_categories(raw.as_deref()))
    }

    /// Add `category` unless it is blank or already present in any casing.
    pub async fn add_preferred_category(&self, category: &str) -> Result<(), DatabaseError> {
        let category = category.trim();
        let mut categories = self.preferred_categories().await?;
        if category.is_empty() || categories.iter().any(|c| eq_ignore_case(c, category)) {
            return Ok(());
        }
        categories.insert(category.to_string());
        self.save_preferred_categories(&categories).await
    }

    pub async fn remove_preferred_category(&self, category: &str) -> Result<(), DatabaseError> {
        let mut categories = self.preferred_categories().await?;
        let before = categories.len();
        categories.retain(|c| !eq_ignore_case(c, category.trim()));
        if categories.len() != before {
            self.save_preferred_categories(&categories).await?;
        }
        Ok(())
    }

    /// Case-insensitive membership check.
    pub async fn is_preferred_category(&self, category: &str) -> Result<bool, DatabaseError> {
        Ok(self
            .preferred_categories()
            .await?
            .iter()
            .any(|c| eq_ignore_case(c, category.trim())))
    }

    pub fn observe_preferred_categories(&self) -> BoxStream<'static, BTreeSet<String>> {
        let values = self
            .db
            .observe_setting(PREFERRED_CATEGORIES_KEY)
            .filter_map(|r| async move {
                match r {
                    Ok(raw) => Some(decode_categories(raw.as_deref())),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read preferred categories");
                        None
                    }
                }
            });
        distinct(values.boxed())
    }

    pub async fn reset_preferred_categories(&self) -> Result<(), DatabaseError> {
        self.db.delete_setting(PREFERRED_CATEGORIES_KEY).await
    }
}

#[async_trait]
impl SheetUrlProvider for Settings {
    async fn sheet_url(&self) -> Result<Option<String>, DatabaseError> {
        self.get_url().await
    }
}

fn decode_categories(raw: Option<&str>) -> BTreeSet<String> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return BTreeSet::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Stored preferred categories are unreadable, ignoring");
        BTreeSet::new()
    })
}

/// Drop values equal to the one emitted just before.
fn distinct<T>(inner: BoxStream<'static, T>) -> BoxStream<'static, T>
where
    T: PartialEq + Clone + Send + 'static,
{
    stream::unfold((inner, None::<T>), |(mut inner, last)| async move {
        loop {
            let next = inner.next().await?;
            if last.as_ref() != Some(&next) {
                return Some((next.clone(), (inner, Some(next))));
            }
        }
    })
    .boxed()
}
