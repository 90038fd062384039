use chrono::{DateTime, Utc};

use super::categories::{contains_lowercase, eq_ignore_case};
use crate::model::Event;

/// Combined event search: free text, category set and featured flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub query: Option<String>,
    /// Empty matches every category.
    pub categories: Vec<String>,
    pub featured_only: bool,
}

/// `needle` must be lowercase and non-empty.
fn matches_text(event: &Event, needle: &str) -> bool {
    [
        &event.title,
        &event.description,
        &event.topic,
        &event.location,
        &event.category,
        &event.scripture_reference,
    ]
    .into_iter()
    .any(|field| contains_lowercase(field, needle))
}

fn normalized_query(query: Option<&str>) -> Option<String> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase)
}

/// Case-insensitive substring search over title, description, topic,
/// location, category and scripture reference. A blank query keeps everything.
pub fn search_events(events: &[Event], query: &str) -> Vec<Event> {
    match normalized_query(Some(query)) {
        Some(needle) => events
            .iter()
            .filter(|e| matches_text(e, &needle))
            .cloned()
            .collect(),
        None => events.to_vec(),
    }
}

pub fn search_with_filters(events: &[Event], filter: &EventFilter) -> Vec<Event> {
    let needle = normalized_query(filter.query.as_deref());
    events
        .iter()
        .filter(|e| needle.as_deref().is_none_or(|n| matches_text(e, n)))
        .filter(|e| {
            filter.categories.is_empty()
                || filter
                    .categories
                    .iter()
                    .any(|c| eq_ignore_case(&e.category, c))
        })
        .filter(|e| !filter.featured_only || e.is_featured)
        .cloned()
        .collect()
}

/// Events strictly after `now`, soonest first.
pub fn upcoming_events(events: &[Event], now: DateTime<Utc>) -> Vec<Event> {
    let mut upcoming: Vec<Event> = events.iter().filter(|e| e.date > now).cloned().collect();
    upcoming.sort_by_key(|e| e.date);
    upcoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Event> {
        vec![
            Event {
                id: "1".into(),
                title: "Sunday Worship".into(),
                category: "Worship".into(),
                location: "Main Hall".into(),
                is_featured: true,
                ..Default::default()
            },
            Event {
                id: "2".into(),
                title: "Youth Night".into(),
                category: "Youth".into(),
                scripture_reference: "Psalm 23".into(),
                ..Default::default()
            },
            Event {
                id: "3".into(),
                title: "Food Drive".into(),
                category: "Outreach".into(),
                description: "Bring canned goods to the main hall".into(),
                ..Default::default()
            },
        ]
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_search_across_fields() {
        let events = sample();
        assert_eq!(ids(&search_events(&events, "MAIN HALL")), ["1", "3"]);
        assert_eq!(ids(&search_events(&events, "psalm")), ["2"]);
        assert_eq!(ids(&search_events(&events, "outreach")), ["3"]);
    }

    #[test]
    fn test_blank_query_is_identity() {
        let events = sample();
        assert_eq!(search_events(&events, "   "), events);
    }

    #[test]
    fn test_no_match() {
        assert!(search_events(&sample(), "baptism").is_empty());
    }

    #[test]
    fn test_search_with_filters() {
        let events = sample();
        let filter = EventFilter {
            query: Some("hall".into()),
            categories: vec!["worship".into(), "outreach".into()],
            featured_only: false,
        };
        assert_eq!(ids(&search_with_filters(&events, &filter)), ["1", "3"]);

        let featured = EventFilter {
            featured_only: true,
            ..filter
        };
        assert_eq!(ids(&search_with_filters(&events, &featured)), ["1"]);

        assert_eq!(
            search_with_filters(&events, &EventFilter::default()),
            events
        );
    }

    #[test]
    fn test_upcoming_sorted_and_strict() {
        let now = Utc.with_ymd_and_hms(2024, 10, 20, 12, 0, 0).unwrap();
        let at = |id: &str, offset: Duration| Event {
            id: id.into(),
            date: now + offset,
            ..Default::default()
        };
        let events = vec![
            at("later", Duration::days(7)),
            at("now", Duration::zero()),
            at("past", -Duration::days(1)),
            at("soon", Duration::hours(1)),
        ];
        assert_eq!(ids(&upcoming_events(&events, now)), ["soon", "later"]);
    }
}
