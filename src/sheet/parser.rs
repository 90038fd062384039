use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use thiserror::Error;

use crate::model::{ChurchProfile, Event, NewsItem};

/// Values accepted as `true` in flag columns (compared case-insensitively).
const TRUTHY: &[&str] = &["true", "1", "yes"];

/// Separator for list-valued cells such as the on-duty roster.
const LIST_SEPARATOR: char = ';';

/// Records parsed from one exported table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable<T> {
    /// Well-formed rows, in sheet order.
    pub records: Vec<T>,
    /// Rows rejected as malformed. Rows dropped for a blank id are not counted.
    pub skipped: usize,
}

impl<T> ParsedTable<T> {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }
}

/// Why a single row was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("row has {found} cells, header has {expected}")]
    ColumnCount { expected: usize, found: usize },
}

/// True when the payload is an HTML page (login wall, error page) rather than CSV.
pub fn looks_like_html(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(9).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Split one CSV line on commas that are outside double quotes.
///
/// Quotes toggle quoted mode and are dropped; there is no escape handling
/// beyond that. Each cell is trimmed.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Parse a sheet date cell.
///
/// Tries, in order: RFC 3339 timestamp, `YYYY-MM-DD`, `YYYY/MM/DD`.
/// Date-only values land on midnight UTC. Anything else, including a blank
/// cell, yields the Unix epoch.
pub fn parse_instant(raw: &str) -> DateTime<Utc> {
    let value = raw.trim();
    if value.is_empty() {
        return DateTime::UNIX_EPOCH;
    }

    // The cache stores milliseconds; finer precision would not survive it.
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return ts.with_timezone(&Utc).trunc_subsecs(3);
    }
    if let Some(date) = parse_date(value) {
        return date;
    }
    if let Some(date) = parse_date(&value.replace('/', "-")) {
        return date;
    }

    tracing::debug!(value = %value, "Unrecognised date, using epoch");
    DateTime::UNIX_EPOCH
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Parse a flag cell against the truthy vocabulary.
pub fn parse_flag(raw: &str) -> bool {
    let value = raw.trim();
    TRUTHY.iter().any(|t| value.eq_ignore_ascii_case(t))
}

/// Split a list cell on `;`, trimming each element.
pub fn parse_list(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(LIST_SEPARATOR)
        .map(|s| s.trim().to_string())
        .collect()
}

// ============================================================================
// Table Parsing
// ============================================================================

/// One data row keyed by lower-cased header name.
struct Row<'a> {
    headers: &'a [String],
    cells: Vec<String>,
}

impl<'a> Row<'a> {
    fn new(headers: &'a [String], line: &str) -> Result<Self, RowError> {
        let cells = split_csv_line(line);
        if cells.len() != headers.len() {
            return Err(RowError::ColumnCount {
                expected: headers.len(),
                found: cells.len(),
            });
        }
        Ok(Self { headers, cells })
    }

    /// Cell under `key`, or "" when the column does not exist.
    fn get(&self, key: &str) -> &str {
        self.headers
            .iter()
            .position(|h| h == key)
            .and_then(|i| self.cells.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn owned(&self, key: &str) -> String {
        self.get(key).to_string()
    }

    /// The row id, or `None` when blank.
    fn id(&self) -> Option<String> {
        let id = self.get("id");
        if id.trim().is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }
}

/// Non-blank lines, with the header row split off and normalised.
fn split_table(text: &str) -> Option<(Vec<String>, Vec<&str>)> {
    if looks_like_html(text) {
        tracing::warn!("Response is an HTML page, not tabular data");
        return None;
    }

    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header_line = lines.next()?;
    let headers = split_csv_line(header_line)
        .into_iter()
        .map(|h| h.to_lowercase())
        .collect();
    Some((headers, lines.collect()))
}

fn parse_table<T>(
    text: &str,
    kind: &str,
    build: impl Fn(&Row<'_>) -> Option<T>,
) -> ParsedTable<T> {
    let Some((headers, lines)) = split_table(text) else {
        return ParsedTable::empty();
    };

    let mut table = ParsedTable::empty();
    for (index, line) in lines.into_iter().enumerate() {
        match Row::new(&headers, line) {
            Ok(row) => match build(&row) {
                Some(record) => table.records.push(record),
                None => tracing::debug!(kind = kind, row = index + 1, "Row without id dropped"),
            },
            Err(e) => {
                tracing::warn!(kind = kind, row = index + 1, error = %e, "Skipping malformed row");
                table.skipped += 1;
            }
        }
    }
    table
}

/// Parse the events tab.
pub fn parse_events(text: &str) -> ParsedTable<Event> {
    parse_table(text, "event", |row| {
        Some(Event {
            id: row.id()?,
            title: row.owned("title"),
            date: parse_instant(row.get("date")),
            category: row.owned("category"),
            location: row.owned("location"),
            description: row.owned("description"),
            topic: row.owned("topic"),
            scripture_reference: row.owned("bibleverse"),
            responsible_person: row.owned("piccouncilmember"),
            assigned_persons: parse_list(row.get("ondutycouncilmembers")),
            is_featured: parse_flag(row.get("isfeatured")),
        })
    })
}

/// Parse the news tab.
pub fn parse_news_items(text: &str) -> ParsedTable<NewsItem> {
    parse_table(text, "news item", |row| {
        let related = row.get("relatedeventid");
        Some(NewsItem {
            id: row.id()?,
            headline: row.owned("headline"),
            publish_date: parse_instant(row.get("publishdate")),
            author: row.owned("author"),
            body: row.owned("body"),
            category: row.owned("category"),
            scripture_reference: row.owned("scripturereference"),
            is_urgent: parse_flag(row.get("isurgent")),
            photo_url: row.owned("photourl"),
            related_event_id: (!related.is_empty()).then(|| related.to_string()),
        })
    })
}

/// Parse the profile tab. Only the first data row is read.
pub fn parse_church_profile(text: &str) -> Option<ChurchProfile> {
    let (headers, lines) = split_table(text)?;
    let line = lines.first()?;

    let row = match Row::new(&headers, line) {
        Ok(row) => row,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping malformed profile row");
            return None;
        }
    };

    Some(ChurchProfile {
        name: row.owned("name"),
        logo_url: row.owned("logourl"),
        welcome_message: row.owned("welcomemessage"),
        address: row.owned("address"),
        phone: row.owned("phone"),
        website: row.owned("website"),
        email: row.owned("email"),
        mission: row.owned("mission"),
        service_times: row.owned("servicetimes"),
        social_link: row.owned("socialfacebook"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const EVENTS_HEADER: &str =
        "ID,Title,Date,Category,Location,Description,Topic,BibleVerse,PICCouncilMember,OnDutyCouncilMembers,IsFeatured";

    #[test]
    fn test_split_respects_quotes() {
        assert_eq!(
            split_csv_line(r#"Alice,"Smith, Jr.",42"#),
            vec!["Alice", "Smith, Jr.", "42"]
        );
    }

    #[test]
    fn test_split_trailing_empty_cell() {
        assert_eq!(split_csv_line("a,b,"), vec!["a", "b", ""]);
    }

    #[test]
    fn test_parse_instant_formats() {
        let midnight = Utc.with_ymd_and_hms(2024, 10, 20, 0, 0, 0).unwrap();
        assert_eq!(parse_instant("2024-10-20"), midnight);
        assert_eq!(parse_instant("2024/10/20"), midnight);
        assert_eq!(
            parse_instant("2024-10-20T10:00:00Z"),
            Utc.with_ymd_and_hms(2024, 10, 20, 10, 0, 0).unwrap()
        );
        assert_eq!(
            parse_instant("2024-10-20T12:00:00+02:00"),
            Utc.with_ymd_and_hms(2024, 10, 20, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_instant_truncates_to_milliseconds() {
        assert_eq!(
            parse_instant("2024-10-20T10:00:00.123456789Z"),
            DateTime::from_timestamp_millis(
                Utc.with_ymd_and_hms(2024, 10, 20, 10, 0, 0).unwrap().timestamp_millis() + 123
            )
            .unwrap()
        );
    }

    #[test]
    fn test_parse_instant_garbage_is_epoch() {
        assert_eq!(parse_instant("garbage"), DateTime::UNIX_EPOCH);
        assert_eq!(parse_instant(""), DateTime::UNIX_EPOCH);
        assert_eq!(parse_instant("10/20/2024"), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_parse_flag_vocabulary() {
        for t in ["true", "TRUE", "1", "Yes", " yes "] {
            assert!(parse_flag(t), "{t} should be truthy");
        }
        for f in ["false", "0", "no", "y", "", "maybe"] {
            assert!(!parse_flag(f), "{f} should be falsy");
        }
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("Ann; Ben ;Cy"), vec!["Ann", "Ben", "Cy"]);
        assert!(parse_list("").is_empty());
        assert!(parse_list("   ").is_empty());
    }

    #[test]
    fn test_parse_events_full_row() {
        let csv = format!(
            "{EVENTS_HEADER}\n\
             e1,Youth Night,2024-10-20T18:30:00Z,Youth,\"Hall A, East Wing\",Games,Courage,Joshua 1:9,Ruth,Ann;Ben,yes\n"
        );
        let table = parse_events(&csv);
        assert_eq!(table.skipped, 0);
        assert_eq!(table.records.len(), 1);

        let e = &table.records[0];
        assert_eq!(e.id, "e1");
        assert_eq!(e.title, "Youth Night");
        assert_eq!(e.location, "Hall A, East Wing");
        assert_eq!(e.scripture_reference, "Joshua 1:9");
        assert_eq!(e.responsible_person, "Ruth");
        assert_eq!(e.assigned_persons, vec!["Ann", "Ben"]);
        assert!(e.is_featured);
        assert_eq!(e.date, Utc.with_ymd_and_hms(2024, 10, 20, 18, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_events_skips_only_malformed_rows() {
        let csv = format!(
            "{EVENTS_HEADER}\n\
             e1,One,2024-01-01,Youth,,,,,,,true\n\
             e2,Two,2024-01-02,Youth,extra,cells,here,,,,,,,\n\
             e3,Three,garbage,Outreach,,,,,,,maybe\n"
        );
        let table = parse_events(&csv);
        let ids: Vec<_> = table.records.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e3"]);
        assert_eq!(table.skipped, 1);

        // Coercion failures never reject a row
        let e3 = &table.records[1];
        assert_eq!(e3.date, DateTime::UNIX_EPOCH);
        assert!(!e3.is_featured);
    }

    #[test]
    fn test_parse_events_drops_blank_ids() {
        let csv = format!(
            "{EVENTS_HEADER}\n\
             ,No id,2024-01-01,,,,,,,,\n\
             \"  \",Blank id,2024-01-01,,,,,,,,\n\
             e9,Kept,2024-01-01,,,,,,,,\n"
        );
        let table = parse_events(&csv);
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].id, "e9");
        assert_eq!(table.skipped, 0);
    }

    #[test]
    fn test_blank_lines_and_crlf_ignored() {
        let csv = format!("{EVENTS_HEADER}\r\n\r\ne1,One,2024-01-01,,,,,,,,\r\n   \r\n");
        let table = parse_events(&csv);
        assert_eq!(table.records.len(), 1);
    }

    #[test]
    fn test_html_payload_yields_nothing() {
        let html = "<!DOCTYPE html><html><body>Sign in</body></html>\nid,title\ne1,x";
        assert!(parse_events(html).records.is_empty());
        assert!(parse_news_items("  <html lang=\"en\">").records.is_empty());
        assert!(parse_church_profile("<!doctype html>\nname\nGrace").is_none());
    }

    #[test]
    fn test_header_only_is_empty() {
        assert!(parse_events(EVENTS_HEADER).records.is_empty());
        assert!(parse_events("").records.is_empty());
    }

    #[test]
    fn test_parse_news_items() {
        let csv = "id,headline,publishDate,author,body,category,scriptureReference,isUrgent,photoURL,relatedEventId\n\
                   n1,Roof fund,2024/03/01,Pastor Jo,\"We did it, thanks!\",Updates,Ps 23,1,https://img.example/x.jpg,e1\n\
                   n2,Choir,2024-03-02,,,Music,,no,,\n";
        let table = parse_news_items(csv);
        assert_eq!(table.records.len(), 2);

        let n1 = &table.records[0];
        assert_eq!(n1.body, "We did it, thanks!");
        assert!(n1.is_urgent);
        assert_eq!(n1.related_event_id.as_deref(), Some("e1"));
        assert_eq!(
            n1.publish_date,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );

        let n2 = &table.records[1];
        assert!(!n2.is_urgent);
        assert_eq!(n2.related_event_id, None);
    }

    #[test]
    fn test_parse_church_profile_first_row_only() {
        let csv = "name,logoURL,welcomeMessage,address,phone,website,email,mission,serviceTimes,socialFacebook\n\
                   Grace Chapel,,Welcome!,\"1 Hill Rd, Springfield\",555-0100,https://grace.example,office@grace.example,Love,Sun 10am,https://fb.example/grace\n\
                   Other,,,,,,,,,\n";
        let profile = parse_church_profile(csv).unwrap();
        assert_eq!(profile.name, "Grace Chapel");
        assert_eq!(profile.address, "1 Hill Rd, Springfield");
        assert_eq!(profile.social_link, "https://fb.example/grace");
    }

    #[test]
    fn test_parse_church_profile_needs_data_row() {
        assert!(parse_church_profile("name,phone\n").is_none());
    }

    proptest! {
        #[test]
        fn prop_parser_never_panics(text in "\\PC{0,400}") {
            let _ = parse_events(&text);
            let _ = parse_news_items(&text);
            let _ = parse_church_profile(&text);
        }

        #[test]
        fn prop_non_blank_ids_survive_verbatim(id in "[A-Za-z0-9_-]{1,12}") {
            let csv = format!("{EVENTS_HEADER}\n{id},T,2024-01-01,,,,,,,,\n");
            let table = parse_events(&csv);
            prop_assert_eq!(table.records.len(), 1);
            prop_assert_eq!(&table.records[0].id, &id);
        }

        #[test]
        fn prop_malformed_row_does_not_hide_neighbours(extra in 1usize..5) {
            let padding = ",x".repeat(extra);
            let csv = format!(
                "{EVENTS_HEADER}\n\
                 a,A,2024-01-01,,,,,,,,\n\
                 b,B,2024-01-01,,,,,,,,{padding}\n\
                 c,C,2024-01-01,,,,,,,,\n"
            );
            let table = parse_events(&csv);
            let ids: Vec<_> = table.records.iter().map(|e| e.id.clone()).collect();
            prop_assert_eq!(ids, vec!["a".to_string(), "c".to_string()]);
            prop_assert_eq!(table.skipped, 1);
        }
    }
}
