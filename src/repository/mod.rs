//! Repositories: published state plus the refresh-with-cache-fallback policy.
//!
//! Each repository owns a `watch` channel holding its published state. The
//! channel is fed from two places only:
//!
//! - the store's live view, subscribed once at construction, which carries
//!   every committed write (including the repository's own refreshes)
//! - the fallback path, which copies the cache in directly when the remote
//!   pull fails
//!
//! No repository operation panics or leaks a transport or storage error
//! unwrapped; every failure comes back as a [`RepositoryError`].

mod error;
mod list;
mod profile;
mod state;

pub use error::{Outcome, RepositoryError};
pub use list::{EventRepository, ListRepository, NewsRepository};
pub use profile::ProfileRepository;
pub use state::{ListState, ProfileState, ViewState};
