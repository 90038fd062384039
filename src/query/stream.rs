use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{category_counts, latest_news, search_with_filters, upcoming_events, EventFilter};
use crate::model::{Event, NewsItem};
use crate::repository::ListState;

/// Recompute `f` over the published list on every state change.
///
/// The first item is computed from the state current at subscription time.
pub fn derive<T, U, F>(rx: watch::Receiver<ListState<T>>, mut f: F) -> BoxStream<'static, U>
where
    T: Clone + Send + Sync + 'static,
    U: Send + 'static,
    F: FnMut(&[T]) -> U + Send + 'static,
{
    WatchStream::new(rx)
        .map(move |state| f(&state.items))
        .boxed()
}

/// Recompute `f` whenever either published list changes.
pub fn combine<A, B, U, F>(
    a: watch::Receiver<ListState<A>>,
    b: watch::Receiver<ListState<B>>,
    f: F,
) -> BoxStream<'static, U>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    U: Send + 'static,
    F: FnMut(&[A], &[B]) -> U + Send + 'static,
{
    stream::unfold((a, b, f, true), |(mut a, mut b, mut f, first)| async move {
        if !first {
            tokio::select! {
                r = a.changed() => r.ok()?,
                r = b.changed() => r.ok()?,
            }
        }
        let left = Arc::clone(&a.borrow_and_update().items);
        let right = Arc::clone(&b.borrow_and_update().items);
        let out = f(&left, &right);
        Some((out, (a, b, f, false)))
    })
    .boxed()
}

/// Upcoming events, with "now" taken afresh at every emission.
pub fn upcoming(rx: watch::Receiver<ListState<Event>>) -> BoxStream<'static, Vec<Event>> {
    derive(rx, |events| upcoming_events(events, Utc::now()))
}

pub fn search(
    rx: watch::Receiver<ListState<Event>>,
    filter: EventFilter,
) -> BoxStream<'static, Vec<Event>> {
    derive(rx, move |events| search_with_filters(events, &filter))
}

pub fn latest(
    rx: watch::Receiver<ListState<NewsItem>>,
    limit: Option<usize>,
    urgent_first: bool,
) -> BoxStream<'static, Vec<NewsItem>> {
    derive(rx, move |news| latest_news(news, limit, urgent_first))
}

pub fn counts(
    events: watch::Receiver<ListState<Event>>,
    news: watch::Receiver<ListState<NewsItem>>,
) -> BoxStream<'static, BTreeMap<String, usize>> {
    combine(events, news, category_counts)
}
