use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SheetRecord;
use crate::sheet::{parse_events, ParsedTable, Tab};

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/?api=1&query=";
const MAPS_DIRECTIONS_URL: &str = "https://www.google.com/maps/dir/?api=1";

/// A calendar entry from the events tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub category: String,
    pub location: String,
    pub description: String,
    pub topic: String,
    pub scripture_reference: String,
    /// Person in charge of the event.
    pub responsible_person: String,
    /// People on duty, in sheet order.
    pub assigned_persons: Vec<String>,
    pub is_featured: bool,
}

impl Event {
    pub fn has_location(&self) -> bool {
        !self.location.trim().is_empty()
    }

    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }

    /// Location for display, with a placeholder when the sheet left it blank.
    pub fn location_or_default(&self) -> &str {
        if self.has_location() {
            &self.location
        } else {
            "Location not specified"
        }
    }

    /// Description block combining every non-blank detail field.
    pub fn formatted_description(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.has_description() {
            parts.push(self.description.clone());
        }
        if !self.topic.trim().is_empty() {
            parts.push(format!("Topic: {}", self.topic));
        }
        if !self.scripture_reference.trim().is_empty() {
            parts.push(format!("Scripture: {}", self.scripture_reference));
        }
        if !self.responsible_person.trim().is_empty() {
            parts.push(format!("Person in charge: {}", self.responsible_person));
        }
        if !self.assigned_persons.is_empty() {
            parts.push(format!("On duty: {}", self.assigned_persons.join(", ")));
        }

        if parts.is_empty() {
            "No description available".to_string()
        } else {
            parts.join("\n\n")
        }
    }

    /// Short teaser: the description (or topic when blank), cut to `max_chars`.
    ///
    /// Truncation counts characters, not bytes, and ends with `...`.
    pub fn summary(&self, max_chars: usize) -> String {
        let text = if self.has_description() {
            &self.description
        } else {
            &self.topic
        };

        if text.chars().count() <= max_chars {
            return text.clone();
        }
        let keep = max_chars.saturating_sub(3);
        let mut out: String = text.chars().take(keep).collect();
        out.push_str("...");
        out
    }

    /// Map search link for the event location, if it has one.
    pub fn maps_url(&self) -> Option<String> {
        if !self.has_location() {
            return None;
        }
        Some(format!("{}{}", MAPS_SEARCH_URL, encode(&self.location)))
    }

    /// Directions link to the event location, from `origin` or the device position.
    pub fn directions_url(&self, origin: Option<&str>) -> Option<String> {
        if !self.has_location() {
            return None;
        }
        let destination = encode(&self.location);
        Some(match origin {
            Some(from) => format!(
                "{}&origin={}&destination={}",
                MAPS_DIRECTIONS_URL,
                encode(from),
                destination
            ),
            None => format!("{}&destination={}", MAPS_DIRECTIONS_URL, destination),
        })
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

impl SheetRecord for Event {
    const KIND: &'static str = "Event";
    const TAB: Tab = Tab::Events;

    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn parse_table(text: &str) -> ParsedTable<Self> {
        parse_events(text)
    }
}
