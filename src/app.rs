use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::repository::{EventRepository, NewsRepository, Outcome, ProfileRepository, RepositoryError};
use crate::settings::{SheetUrlProvider, Settings};
use crate::sheet::{test_connection, ConnectionReport, SheetSource, SheetsClient};
use crate::storage::Database;

// ============================================================================
// Refresh Summary
// ============================================================================

/// Per-repository results of one refresh round.
#[derive(Debug)]
pub struct RefreshSummary {
    pub events: Result<Outcome, RepositoryError>,
    pub news: Result<Outcome, RepositoryError>,
    pub profile: Result<Outcome, RepositoryError>,
}

impl RefreshSummary {
    /// Every repository has something to show (fresh or cached).
    pub fn all_ok(&self) -> bool {
        self.events.is_ok() && self.news.is_ok() && self.profile.is_ok()
    }

    /// Cache-fallback notices, in events/news/profile order.
    pub fn notices(&self) -> Vec<&str> {
        [&self.events, &self.news, &self.profile]
            .into_iter()
            .filter_map(|r| r.as_ref().ok().and_then(Outcome::notice))
            .collect()
    }
}

async fn refresh_repositories(
    events: &EventRepository,
    news: &NewsRepository,
    profile: &ProfileRepository,
) -> RefreshSummary {
    let (events, news, profile) = tokio::join!(events.refresh(), news.refresh(), profile.refresh());
    RefreshSummary {
        events,
        news,
        profile,
    }
}

// ============================================================================
// App
// ============================================================================

/// Everything the front end needs: the cache, settings, and one repository
/// per record kind, all sharing one database and one HTTP client.
pub struct App {
    pub db: Database,
    pub settings: Settings,
    pub source: Arc<dyn SheetSource>,
    pub events: Arc<EventRepository>,
    pub news: Arc<NewsRepository>,
    pub profile: Arc<ProfileRepository>,
    refresh_interval: Option<Duration>,
    refresh_handle: Option<JoinHandle<()>>,
}

impl App {
    /// Open (or create) the cache at `db_path` and wire the repositories.
    ///
    /// Must be called inside a Tokio runtime.
    pub async fn open(config: &Config, db_path: &str) -> Result<Self> {
        let db = Database::open(db_path).await?;
        let client = SheetsClient::new(config).context("Failed to create HTTP client")?;
        Ok(Self::with_source(config, db, Arc::new(client)))
    }

    /// Wire the repositories around an existing database and sheet source.
    pub fn with_source(config: &Config, db: Database, source: Arc<dyn SheetSource>) -> Self {
        let settings = Settings::new(db.clone());
        let urls: Arc<dyn SheetUrlProvider> = Arc::new(settings.clone());

        let events = Arc::new(EventRepository::new(
            Arc::new(db.clone()),
            Arc::clone(&source),
            Arc::clone(&urls),
        ));
        let news = Arc::new(NewsRepository::new(
            Arc::new(db.clone()),
            Arc::clone(&source),
            Arc::clone(&urls),
        ));
        let profile = Arc::new(ProfileRepository::new(
            Arc::new(db.clone()),
            Arc::clone(&source),
            urls,
        ));

        let refresh_interval = config.refresh_interval();

        Self {
            db,
            settings,
            source,
            events,
            news,
            profile,
            refresh_interval,
            refresh_handle: None,
        }
    }

    /// Refresh all three repositories concurrently.
    pub async fn refresh_all(&self) -> RefreshSummary {
        refresh_repositories(&self.events, &self.news, &self.profile).await
    }

    /// `load` all three repositories concurrently.
    pub async fn load_all(&self) -> RefreshSummary {
        let (events, news, profile) =
            tokio::join!(self.events.load(), self.news.load(), self.profile.load());
        RefreshSummary {
            events,
            news,
            profile,
        }
    }

    /// Check `url`, or the saved URL when `None`, without touching the cache.
    pub async fn test_connection(&self, url: Option<&str>) -> ConnectionReport {
        let url = match url {
            Some(u) => Some(u.trim().to_string()),
            None => self.settings.get_url().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to read spreadsheet URL");
                None
            }),
        };
        test_connection(self.source.as_ref(), url.as_deref().unwrap_or_default()).await
    }

    /// Wipe cached content and every setting.
    pub async fn reset(&self) -> Result<()> {
        self.db
            .clear_cache()
            .await
            .context("Failed to clear content cache")?;
        self.db
            .clear_settings()
            .await
            .context("Failed to clear settings")?;
        self.events.clear_error();
        self.events.clear_selection();
        self.news.clear_error();
        self.news.clear_selection();
        self.profile.clear_error();
        tracing::info!("Reset complete");
        Ok(())
    }

    /// Start refreshing in the background every `refresh_interval_minutes`.
    ///
    /// No-op when the interval is 0 or a refresh task is already running. A
    /// round is skipped while any repository is still loading.
    pub fn start_periodic_refresh(&mut self) {
        let Some(period) = self.refresh_interval else {
            return;
        };
        if self.refresh_handle.is_some() {
            return;
        }

        let events = Arc::clone(&self.events);
        let news = Arc::clone(&self.news);
        let profile = Arc::clone(&self.profile);
        self.refresh_handle = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the caller already loaded.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                if events.snapshot().loading || news.snapshot().loading || profile.snapshot().loading {
                    tracing::debug!("Periodic refresh skipped: refresh already in flight");
                    continue;
                }
                let summary = refresh_repositories(&events, &news, &profile).await;
                tracing::info!(
                    ok = summary.all_ok(),
                    notices = summary.notices().len(),
                    "Periodic refresh finished"
                );
            }
        }));
        tracing::debug!(period_secs = period.as_secs(), "Periodic refresh started");
    }

    pub fn stop_periodic_refresh(&mut self) {
        if let Some(handle) = self.refresh_handle.take() {
            handle.abort();
            tracing::debug!("Periodic refresh stopped");
        }
    }
}

/// Abort the periodic refresh task so it cannot outlive the app.
impl Drop for App {
    fn drop(&mut self) {
        self.stop_periodic_refresh();
    }
}
