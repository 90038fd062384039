use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::{Outcome, PullError, RepositoryError, NOT_CONFIGURED_MESSAGE};
use super::state::ListState;
use crate::model::{Event, NewsItem, SheetRecord};
use crate::settings::SheetUrlProvider;
use crate::sheet::SheetSource;
use crate::storage::RecordStore;

pub type EventRepository = ListRepository<Event>;
pub type NewsRepository = ListRepository<NewsItem>;

/// Single source of truth for one keyed record kind.
///
/// On construction the repository subscribes to the store's live view and
/// mirrors every emission into its published [`ListState`]. `refresh` writes
/// to the store and lets that subscription carry the new contents back, so
/// the published list always reflects what is durably stored.
///
/// Must be constructed inside a Tokio runtime. Dropping the repository stops
/// the subscription.
pub struct ListRepository<T: SheetRecord> {
    state: Arc<watch::Sender<ListState<T>>>,
    store: Arc<dyn RecordStore<T>>,
    source: Arc<dyn SheetSource>,
    urls: Arc<dyn SheetUrlProvider>,
    observer: JoinHandle<()>,
}

impl<T: SheetRecord> ListRepository<T> {
    pub fn new(
        store: Arc<dyn RecordStore<T>>,
        source: Arc<dyn SheetSource>,
        urls: Arc<dyn SheetUrlProvider>,
    ) -> Self {
        let (tx, _) = watch::channel(ListState::default());
        let state = Arc::new(tx);

        let mut changes = store.observe_all();
        let published = Arc::clone(&state);
        let observer = tokio::spawn(async move {
            while let Some(next) = changes.next().await {
                match next {
                    Ok(items) => {
                        tracing::trace!(kind = T::KIND, count = items.len(), "Cache emitted");
                        published.send_modify(|s| s.items = Arc::new(items));
                    }
                    Err(e) => {
                        tracing::warn!(kind = T::KIND, error = %e, "Cache observation failed");
                    }
                }
            }
            tracing::debug!(kind = T::KIND, "Cache observation ended");
        });

        Self {
            state,
            store,
            source,
            urls,
            observer,
        }
    }

    /// Receiver for the published state. Every change wakes it.
    pub fn subscribe(&self) -> watch::Receiver<ListState<T>> {
        self.state.subscribe()
    }

    /// Clone of the current published state.
    pub fn snapshot(&self) -> ListState<T> {
        self.state.borrow().clone()
    }

    /// Refresh only when nothing has been published yet.
    pub async fn load(&self) -> Result<Outcome, RepositoryError> {
        let published = !self.state.borrow().items.is_empty();
        if published {
            return Ok(Outcome::Fresh);
        }
        self.refresh().await
    }

    /// Pull the tab, replace the cache, and fall back to the cache on failure.
    ///
    /// A missing URL is a hard error and never falls back. Any fetch or store
    /// failure after that is answered from the cache when it has data.
    pub async fn refresh(&self) -> Result<Outcome, RepositoryError> {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let url = match self.urls.sheet_url().await {
            Ok(url) => url.filter(|u| !u.trim().is_empty()),
            Err(e) => {
                tracing::warn!(kind = T::KIND, error = %e, "Failed to read spreadsheet URL");
                return self.fall_back(PullError::Store(e)).await;
            }
        };
        let Some(url) = url else {
            tracing::warn!(kind = T::KIND, "Refresh skipped: no spreadsheet URL");
            self.finish(Some(NOT_CONFIGURED_MESSAGE.to_string()));
            return Err(RepositoryError::NotConfigured);
        };

        match self.pull(&url).await {
            Ok(count) => {
                tracing::info!(kind = T::KIND, count, "Refreshed from spreadsheet");
                self.finish(None);
                Ok(Outcome::Fresh)
            }
            Err(e) => self.fall_back(e).await,
        }
    }

    async fn pull(&self, url: &str) -> Result<usize, PullError> {
        let text = self.source.fetch_tab(url, T::TAB).await?;
        let parsed = T::parse_table(&text);
        if parsed.skipped > 0 {
            tracing::warn!(kind = T::KIND, skipped = parsed.skipped, "Skipped malformed rows");
        }
        self.store.replace_all(&parsed.records).await?;
        Ok(parsed.records.len())
    }

    async fn fall_back(&self, cause: PullError) -> Result<Outcome, RepositoryError> {
        let cause = cause.to_string();
        match self.store.get_all().await {
            Ok(cached) if !cached.is_empty() => {
                let notice = format!("Using cached data. {cause}");
                tracing::info!(kind = T::KIND, count = cached.len(), cause = %cause, "Serving cached data");
                self.state.send_modify(|s| {
                    s.items = Arc::new(cached);
                    s.loading = false;
                    s.error = Some(notice.clone());
                });
                Ok(Outcome::Cached { notice })
            }
            Ok(_) => {
                tracing::warn!(kind = T::KIND, cause = %cause, "Refresh failed with empty cache");
                self.finish(Some(cause.clone()));
                Err(RepositoryError::Unavailable { cause })
            }
            Err(e) => {
                tracing::warn!(kind = T::KIND, cause = %cause, error = %e, "Refresh failed and cache unreadable");
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

    /// Make `id` the selected record: published list first, then the store.
    ///
    /// An unknown id sets the error slot and leaves the selection untouched.
    pub async fn select(&self, id: &str) {
        match self.find(id).await {
            Ok(record) => self.state.send_modify(|s| s.selected = Some(record)),
            Err(e) => {
                tracing::debug!(kind = T::KIND, id, error = %e, "Selection failed");
                let message = e.to_string();
                self.state.send_modify(|s| s.error = Some(message));
            }
        }
    }

    pub fn clear_selection(&self) {
        self.state.send_modify(|s| s.selected = None);
    }

    /// Look `id` up in the published list, then in the store.
    pub async fn get_by_id(&self, id: &str) -> Result<T, RepositoryError> {
        self.find(id).await
    }

    async fn find(&self, id: &str) -> Result<T, RepositoryError> {
        let published = self
            .state
            .borrow()
            .items
            .iter()
            .find(|r| r.id() == id)
            .cloned();
        if let Some(record) = published {
            return Ok(record);
        }

        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                kind: T::KIND,
                id: id.to_string(),
            })
    }

    /// Reset only the error slot.
    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }
}

impl<T: SheetRecord> Drop for ListRepository<T> {
    fn drop(&mut self) {
        self.observer.abort();
    }
}
