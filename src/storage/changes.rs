use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use tokio::sync::watch;

use super::types::DatabaseError;

/// Table whose committed writes are broadcast to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Table {
    Events,
    News,
    Profile,
    Settings,
}

/// One version counter per table. Writers bump the counter after commit;
/// observers re-query whenever the counter moves.
pub(crate) struct ChangeFeed {
    events: watch::Sender<u64>,
    news: watch::Sender<u64>,
    profile: watch::Sender<u64>,
    settings: watch::Sender<u64>,
}

impl ChangeFeed {
    pub(crate) fn new() -> Self {
        Self {
            events: watch::channel(0).0,
            news: watch::channel(0).0,
            profile: watch::channel(0).0,
            settings: watch::channel(0).0,
        }
    }

    fn sender(&self, table: Table) -> &watch::Sender<u64> {
        match table {
            Table::Events => &self.events,
            Table::News => &self.news,
            Table::Profile => &self.profile,
            Table::Settings => &self.settings,
        }
    }

    pub(crate) fn notify(&self, table: Table) {
        self.sender(table).send_modify(|v| *v = v.wrapping_add(1));
        tracing::trace!(table = ?table, "Table changed");
    }

    pub(crate) fn subscribe(&self, table: Table) -> watch::Receiver<u64> {
        self.sender(table).subscribe()
    }
}

/// Stream that yields `load()` once immediately and again after every
/// change notification.
///
/// The version is marked seen *before* querying, so a write that commits while
/// a query is running triggers one more emission. Bursts of writes collapse
/// into a single re-query; emissions are never reordered.
pub(crate) fn observe<T, F, Fut>(
    rx: watch::Receiver<u64>,
    load: F,
) -> BoxStream<'static, Result<T, DatabaseError>>
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, DatabaseError>> + Send + 'static,
{
    stream::unfold((rx, load, true), |(mut rx, mut load, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        rx.borrow_and_update();
        let item = load().await;
        Some((item, (rx, load, false)))
    })
    .boxed()
}
