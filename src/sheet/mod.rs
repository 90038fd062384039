//! Spreadsheet access: export URL building, HTTP retrieval and CSV parsing.
//!
//! The content document is a spreadsheet with three tabs. Each tab is pulled
//! as CSV through the spreadsheet's export endpoint and parsed into domain
//! records:
//!
//! - [`parser`] - tolerant CSV-to-record conversion (bad rows are skipped, never fatal)
//! - [`fetcher`] - HTTP client with timeouts and a size cap, plus the [`SheetSource`] seam
//! - [`connection`] - end-to-end connectivity check across all three tabs
//!
//! # Example
//!
//! ```ignore
//! use chapel::sheet::SheetsClient;
//!
//! let client = SheetsClient::new(&config)?;
//! let events = client.fetch_events("https://docs.google.com/spreadsheets/d/ABC123/edit").await;
//! ```

mod connection;
mod fetcher;
mod parser;

pub use connection::{test_connection, test_tab, ConnectionReport};
pub use fetcher::{extract_document_id, FetchError, SheetSource, SheetsClient};
pub use parser::{
    looks_like_html, parse_church_profile, parse_events, parse_flag, parse_instant, parse_list,
    parse_news_items, split_csv_line, ParsedTable, RowError,
};

use std::fmt;

/// Logical tab of the content document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Events,
    News,
    Profile,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Events, Tab::News, Tab::Profile];

    /// Tab name as it appears in the spreadsheet.
    pub fn sheet_name(self) -> &'static str {
        match self {
            Tab::Events => "Events",
            Tab::News => "News",
            Tab::Profile => "ChurchProfile",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}
