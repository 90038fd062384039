//! Stateless views over published repository state.
//!
//! Each function is pure: it takes a slice and returns a fresh `Vec` (or map)
//! and never fails; empty input gives empty output. The [`stream`] adapters
//! re-run them on every emission of a repository's published state, so
//! time-dependent views such as [`upcoming_events`] read the clock each time.

mod categories;
mod events;
mod news;
pub mod stream;

pub use categories::{
    all_categories, category_counts, eq_ignore_case, filter_both, filter_by_categories,
    filter_by_category,
};
pub use events::{search_events, search_with_filters, upcoming_events, EventFilter};
pub use news::{
    latest_news, news_between, news_between_in_category, news_from_last_days, urgent_news,
};
