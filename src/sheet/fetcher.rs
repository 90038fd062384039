use async_trait::async_trait;
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

use super::parser::{looks_like_html, parse_church_profile, parse_events, parse_news_items};
use super::Tab;
use crate::config::Config;
use crate::model::{ChurchProfile, Event, NewsItem};

/// Path segment that precedes the document id in spreadsheet URLs.
const DOCUMENT_PATH: &str = "/spreadsheets/d/";

/// Errors that can occur while pulling one tab from the spreadsheet.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response body was not valid UTF-8
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    /// The server answered with an HTML page (sign-in wall, unpublished sheet)
    #[error("Spreadsheet returned an HTML page instead of CSV; is it shared publicly?")]
    NotTabular,
}

/// Source of raw tab text. Repositories depend on this rather than on HTTP.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Retrieve the CSV text of `tab` from the document at `sheet_url`.
    async fn fetch_tab(&self, sheet_url: &str, tab: Tab) -> Result<String, FetchError>;
}

/// Extract the document id from a spreadsheet URL.
///
/// The id is the run of `[A-Za-z0-9_-]` following `/spreadsheets/d/`.
pub fn extract_document_id(url: &str) -> Option<&str> {
    let start = url.find(DOCUMENT_PATH)? + DOCUMENT_PATH.len();
    let rest = &url[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    let id = &rest[..end];
    (!id.is_empty()).then_some(id)
}

/// Redirect policy for export downloads.
///
/// Export URLs redirect once or twice to a content host; more than that, or
/// a loop, means something is wrong.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 5 {
            return attempt.error("Too many redirects (max 5)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

/// HTTP client for the spreadsheet export endpoint.
#[derive(Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    export_host: String,
    gids: [u64; 3],
    timeout: Duration,
    max_response_bytes: usize,
}

impl SheetsClient {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .timeout(timeout)
            .redirect(create_redirect_policy())
            .build()?;

        Ok(Self {
            client,
            export_host: config.export_host.trim_end_matches('/').to_string(),
            gids: [config.events_gid, config.news_gid, config.profile_gid],
            timeout,
            max_response_bytes: config.max_response_bytes,
        })
    }

    fn gid(&self, tab: Tab) -> u64 {
        match tab {
            Tab::Events => self.gids[0],
            Tab::News => self.gids[1],
            Tab::Profile => self.gids[2],
        }
    }

    /// CSV export URL for `tab`.
    ///
    /// Falls back to `sheet_url` itself when no document id can be found, so
    /// an already-published CSV link keeps working.
    pub fn export_url(&self, sheet_url: &str, tab: Tab) -> String {
        match extract_document_id(sheet_url) {
            Some(id) => format!(
                "{}/spreadsheets/d/{}/export?format=csv&gid={}",
                self.export_host,
                id,
                self.gid(tab)
            ),
            None => sheet_url.to_string(),
        }
    }

    /// Fetch events, or an empty list on any failure.
    pub async fn fetch_events(&self, sheet_url: &str) -> Vec<Event> {
        match self.fetch_tab(sheet_url, Tab::Events).await {
            Ok(text) => parse_events(&text).records,
            Err(e) => {
                tracing::warn!(tab = %Tab::Events, error = %e, "Error fetching events");
                Vec::new()
            }
        }
    }

    /// Fetch news items, or an empty list on any failure.
    pub async fn fetch_news_items(&self, sheet_url: &str) -> Vec<NewsItem> {
        match self.fetch_tab(sheet_url, Tab::News).await {
            Ok(text) => parse_news_items(&text).records,
            Err(e) => {
                tracing::warn!(tab = %Tab::News, error = %e, "Error fetching news");
                Vec::new()
            }
        }
    }

    /// Fetch the profile, or `None` on any failure.
    pub async fn fetch_church_profile(&self, sheet_url: &str) -> Option<ChurchProfile> {
        match self.fetch_tab(sheet_url, Tab::Profile).await {
            Ok(text) => parse_church_profile(&text),
            Err(e) => {
                tracing::warn!(tab = %Tab::Profile, error = %e, "Error fetching church profile");
                None
            }
        }
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    async fn fetch_tab(&self, sheet_url: &str, tab: Tab) -> Result<String, FetchError> {
        let url = self.export_url(sheet_url, tab);
        tracing::debug!(tab = %tab, url = %url, "Fetching tab");

        let response = tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, self.max_response_bytes).await?;
        let text = String::from_utf8(bytes).map_err(|_| FetchError::InvalidUtf8)?;

        if looks_like_html(&text) {
            return Err(FetchError::NotTabular);
        }
        Ok(text)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
