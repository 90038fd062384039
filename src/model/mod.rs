//! Domain records mirrored from the content spreadsheet.
//!
//! Three record kinds exist, one per tab of the source document:
//!
//! - [`Event`] - calendar entries (services, seminars, outreach)
//! - [`NewsItem`] - announcements and pastoral updates
//! - [`ChurchProfile`] - the singleton contact/profile record
//!
//! Events and news items are keyed collections and implement [`SheetRecord`],
//! which is what lets a single generic repository drive both of them.

mod event;
mod news;
mod profile;

pub use event::Event;
pub use news::NewsItem;
pub use profile::{ChurchProfile, ProfileError};

use crate::sheet::{ParsedTable, Tab};

/// A keyed record that lives in its own tab and its own cache table.
pub trait SheetRecord: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Human-readable kind used in log lines and error messages.
    const KIND: &'static str;

    /// The tab this record kind is exported from.
    const TAB: Tab;

    /// Stable unique key taken verbatim from the source row.
    fn id(&self) -> &str;

    /// Free-form category label (may be blank).
    fn category(&self) -> &str;

    /// Parse a whole exported table into records, skipping bad rows.
    fn parse_table(text: &str) -> ParsedTable<Self>;
}
