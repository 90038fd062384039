use super::parser::{parse_church_profile, parse_events, parse_news_items};
use super::{SheetSource, Tab};

/// Outcome of pulling every tab once from a candidate document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub successful: bool,
    pub message: String,
    pub events: usize,
    pub news: usize,
    pub has_profile: bool,
}

impl ConnectionReport {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            successful: false,
            message: message.into(),
            events: 0,
            news: 0,
            has_profile: false,
        }
    }
}

/// Fetch all three tabs from `sheet_url` and report what was found.
///
/// The check succeeds when at least one tab yields data. Tab fetches run
/// concurrently; a tab that fails counts as empty.
pub async fn test_connection(source: &dyn SheetSource, sheet_url: &str) -> ConnectionReport {
    if sheet_url.trim().is_empty() {
        return ConnectionReport::failed("No spreadsheet URL configured");
    }

    let (events, news, profile) = tokio::join!(
        source.fetch_tab(sheet_url, Tab::Events),
        source.fetch_tab(sheet_url, Tab::News),
        source.fetch_tab(sheet_url, Tab::Profile),
    );

    let mut first_error = None;
    let mut note = |tab: Tab, e: &dyn std::fmt::Display| {
        tracing::warn!(tab = %tab, error = %e, "Connection test: tab unavailable");
        first_error.get_or_insert_with(|| e.to_string());
    };

    let events = match events {
        Ok(text) => parse_events(&text).records.len(),
        Err(e) => {
            note(Tab::Events, &e);
            0
        }
    };
    let news = match news {
        Ok(text) => parse_news_items(&text).records.len(),
        Err(e) => {
            note(Tab::News, &e);
            0
        }
    };
    let has_profile = match profile {
        Ok(text) => parse_church_profile(&text).is_some(),
        Err(e) => {
            note(Tab::Profile, &e);
            false
        }
    };

    if events == 0 && news == 0 && !has_profile {
        let message = match first_error {
            Some(e) => format!("Connection failed: {e}"),
            None => "Connected, but no data found. Check that the sheet is published, \
                     the tab names match, and every tab has a header row."
                .to_string(),
        };
        return ConnectionReport::failed(message);
    }

    let mut message = String::from("Connection successful!");
    if events > 0 {
        message.push_str(&format!("\n- Found {events} events"));
    }
    if news > 0 {
        message.push_str(&format!("\n- Found {news} news items"));
    }
    if has_profile {
        message.push_str("\n- Found church profile");
    }

    ConnectionReport {
        successful: true,
        message,
        events,
        news,
        has_profile,
    }
}

/// True when `tab` can be fetched and contains at least one record.
pub async fn test_tab(source: &dyn SheetSource, sheet_url: &str, tab: Tab) -> bool {
    let Ok(text) = source.fetch_tab(sheet_url, tab).await else {
        return false;
    };
    match tab {
        Tab::Events => !parse_events(&text).records.is_empty(),
        Tab::News => !parse_news_items(&text).records.is_empty(),
        Tab::Profile => parse_church_profile(&text).is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::FetchError;
    use async_trait::async_trait;

    struct StaticSource {
        events: Option<&'static str>,
        news: Option<&'static str>,
        profile: Option<&'static str>,
    }

    #[async_trait]
    impl SheetSource for StaticSource {
        async fn fetch_tab(&self, _url: &str, tab: Tab) -> Result<String, FetchError> {
            let text = match tab {
                Tab::Events => self.events,
                Tab::News => self.news,
                Tab::Profile => self.profile,
            };
            text.map(str::to_string).ok_or(FetchError::HttpStatus(500))
        }
    }

    #[tokio::test]
    async fn test_connection_reports_counts() {
        let source = StaticSource {
            events: Some("id,title\ne1,A\ne2,B\n"),
            news: Some("id,headline\n"),
            profile: Some("name,phone\nGrace,555\n"),
        };
        let report = test_connection(&source, "https://sheet").await;
        assert!(report.successful);
        assert_eq!(report.events, 2);
        assert_eq!(report.news, 0);
        assert!(report.has_profile);
        assert!(report.message.contains("Found 2 events"));
        assert!(!report.message.contains("news items"));
    }

    #[tokio::test]
    async fn test_connection_all_tabs_failing() {
        let source = StaticSource {
            events: None,
            news: None,
            profile: None,
        };
        let report = test_connection(&source, "https://sheet").await;
        assert!(!report.successful);
        assert!(report.message.starts_with("Connection failed"));
    }

    #[tokio::test]
    async fn test_connection_empty_tabs() {
        let source = StaticSource {
            events: Some("id,title\n"),
            news: Some(""),
            profile: Some("name\n"),
        };
        let report = test_connection(&source, "https://sheet").await;
        assert!(!report.successful);
        assert!(report.message.contains("no data found"));
    }

    #[tokio::test]
    async fn test_connection_requires_url() {
        let source = StaticSource {
            events: None,
            news: None,
            profile: None,
        };
        assert!(!test_connection(&source, "  ").await.successful);
    }

    #[tokio::test]
    async fn test_tab_checks() {
        let source = StaticSource {
            events: Some("id,title\ne1,A\n"),
            news: None,
            profile: Some("name\n"),
        };
        assert!(test_tab(&source, "u", Tab::Events).await);
        assert!(!test_tab(&source, "u", Tab::News).await);
        assert!(!test_tab(&source, "u", Tab::Profile).await);
    }
}
