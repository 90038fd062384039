use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SheetRecord;
use crate::sheet::{parse_news_items, ParsedTable, Tab};

/// An announcement from the news tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub headline: String,
    pub publish_date: DateTime<Utc>,
    pub author: String,
    pub body: String,
    pub category: String,
    pub scripture_reference: String,
    pub is_urgent: bool,
    /// Photo URL, stored as text and never fetched.
    pub photo_url: String,
    /// Event this item refers to. Not checked against the events table.
    pub related_event_id: Option<String>,
}

impl SheetRecord for NewsItem {
    const KIND: &'static str = "News item";
    const TAB: Tab = Tab::News;

    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn parse_table(text: &str) -> ParsedTable<Self> {
        parse_news_items(text)
    }
}
