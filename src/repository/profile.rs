use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::{Outcome, PullError, RepositoryError, NOT_CONFIGURED_MESSAGE};
use super::state::ProfileState;
use crate::model::ChurchProfile;
use crate::settings::SheetUrlProvider;
use crate::sheet::{parse_church_profile, SheetSource, Tab};
use crate::storage::ProfileStore;

/// Single source of truth for the church profile.
///
/// Same lifecycle as [`super::ListRepository`], for a record that exists at
/// most once.
pub struct ProfileRepository {
    state: Arc<watch::Sender<ProfileState>>,
    store: Arc<dyn ProfileStore>,
    source: Arc<dyn SheetSource>,
    urls: Arc<dyn SheetUrlProvider>,
    observer: JoinHandle<()>,
}

impl ProfileRepository {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        source: Arc<dyn SheetSource>,
        urls: Arc<dyn SheetUrlProvider>,
    ) -> Self {
        let (tx, _) = watch::channel(ProfileState::default());
        let state = Arc::new(tx);

        let mut changes = store.observe();
        let published = Arc::clone(&state);
        let observer = tokio::spawn(async move {
            while let Some(next) = changes.next().await {
                match next {
                    Ok(profile) => published.send_modify(|s| s.profile = profile),
                    Err(e) => tracing::warn!(error = %e, "Profile cache observation failed"),
                }
            }
        });

        Self {
            state,
            store,
            source,
            urls,
            observer,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProfileState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ProfileState {
        self.state.borrow().clone()
    }

    pub async fn load(&self) -> Result<Outcome, RepositoryError> {
        let published = self.state.borrow().profile.is_some();
        if published {
            return Ok(Outcome::Fresh);
        }
        self.refresh().await
    }

    /// Pull the profile tab and replace the cached profile.
    ///
    /// A tab without a data row leaves the cache as it is and still counts
    /// as a successful refresh.
    pub async fn refresh(&self) -> Result<Outcome, RepositoryError> {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let url = match self.urls.sheet_url().await {
            Ok(url) => url.filter(|u| !u.trim().is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read spreadsheet URL");
                return self.fall_back(PullError::Store(e)).await;
            }
        };
        let Some(url) = url else {
            tracing::warn!("Profile refresh skipped: no spreadsheet URL");
            self.finish(Some(NOT_CONFIGURED_MESSAGE.to_string()));
            return Err(RepositoryError::NotConfigured);
        };

        match self.pull(&url).await {
            Ok(found) => {
                tracing::info!(found, "Refreshed church profile");
                self.finish(None);
                Ok(Outcome::Fresh)
            }
            Err(e) => self.fall_back(e).await,
        }
    }

    async fn pull(&self, url: &str) -> Result<bool, PullError> {
        let text = self.source.fetch_tab(url, Tab::Profile).await?;
        match parse_church_profile(&text) {
            Some(profile) => {
                self.store.replace(&profile).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn fall_back(&self, cause: PullError) -> Result<Outcome, RepositoryError> {
        let cause = cause.to_string();
        match self.store.get().await {
            Ok(Some(cached)) => {
                let notice = format!("Using cached data. {cause}");
                tracing::info!(cause = %cause, "Serving cached church profile");
                self.state.send_modify(|s| {
                    s.profile = Some(cached);
                    s.loading = false;
                    s.error = Some(notice.clone());
                });
                Ok(Outcome::Cached { notice })
            }
            Ok(None) => {
                tracing::warn!(cause = %cause, "Profile refresh failed with empty cache");
                self.finish(Some(cause.clone()));
                Err(RepositoryError::Unavailable { cause })
            }
            Err(e) => {
                tracing::warn!(cause = %cause, error = %e, "Profile refresh failed and cache unreadable");
                self.finish(Some(cause.clone()));
                Err(RepositoryError::Unavailable { cause })
            }
        }
    }

    fn finish(&self, error: Option<String>) {
        self.state.send_modify(|s| {
            s.loading = false;
            s.error = error;
        });
    }

    /// Validate and store a locally edited profile.
    ///
    /// The next successful refresh overwrites it with the sheet's version.
    pub async fn update_profile(&self, profile: &ChurchProfile) -> Result<(), RepositoryError> {
        profile.validate()?;
        self.store.replace(profile).await?;
        tracing::info!("Church profile updated locally");
        Ok(())
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }
}

impl Drop for ProfileRepository {
    fn drop(&mut self) {
        self.observer.abort();
    }
}
