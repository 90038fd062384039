//! Integration tests for the sync lifecycle: fetch, cache, republish, fall back.
//!
//! Each test runs its own mock spreadsheet server and in-memory SQLite
//! database, and drives the repositories through `App`.

use std::sync::Arc;
use std::time::Duration;

use chapel::app::App;
use chapel::config::Config;
use chapel::query::{filter_by_category, latest_news, search_with_filters, stream, EventFilter};
use chapel::repository::{ListState, Outcome, RepositoryError};
use chapel::sheet::SheetsClient;
use chapel::storage::Database;
use futures::StreamExt;
use tokio::sync::watch;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/DOC42/edit#gid=0";
const EXPORT_PATH: &str = "/spreadsheets/d/DOC42/export";

const EVENTS_CSV: &str = "\
ID,Title,Date,Category,Location,Description,Topic,BibleVerse,PICCouncilMember,OnDutyCouncilMembers,IsFeatured
e1,Sunday Service,2099-01-04T10:00:00Z,Worship,Main Hall,Weekly service,,,Pastor Ann,Ann;Ben,true
e2,Youth Night,2099-01-09,Youth,,\"Games, pizza and prayer\",,,,,false
e3,Harvest Drive,2000/10/20,Outreach,Food Bank,,,,,,false
e4,Broken row,2099-01-01
";

const NEWS_CSV: &str = "\
ID,Headline,PublishDate,Author,Body,Category,ScriptureReference,IsUrgent,PhotoUrl,RelatedEventId
n1,Building fund update,2024-03-01,Treasurer,We are halfway there,Announcements,,false,,
n2,Service moved,2024-03-05,Office,Sunday service moves to 11am,Announcements,,true,,e1
n3,Youth camp signups,2024-02-20,Youth Team,Sign up by Friday,Youth,,no,,e2
";

const PROFILE_CSV: &str = "\
Name,WelcomeMessage,Address,Phone,Website,Email,Mission,ServiceTimes,SocialFacebook,LogoUrl
Grace Chapel,Welcome home,1 Church St,555-0100,https://grace.example,hello@grace.example,Love God,Sun 10am,,
";

fn tab(gid: &'static str, body: &'static str) -> Mock {
    Mock::given(method("GET"))
        .and(path(EXPORT_PATH))
        .and(query_param("format", "csv"))
        .and(query_param("gid", gid))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
}

fn failing(gid: &'static str, status: u16) -> Mock {
    Mock::given(method("GET"))
        .and(path(EXPORT_PATH))
        .and(query_param("gid", gid))
        .respond_with(ResponseTemplate::new(status))
}

async fn test_app(server: &MockServer) -> App {
    let config = Config {
        export_host: server.uri(),
        request_timeout_secs: 5,
        events_gid: 0,
        news_gid: 1,
        profile_gid: 2,
        refresh_interval_minutes: 0,
        ..Config::default()
    };
    let db = Database::open(":memory:").await.unwrap();
    let client = SheetsClient::new(&config).unwrap();
    App::with_source(&config, db, Arc::new(client))
}

/// Wait until the published list satisfies `pred`.
async fn published<T, F>(rx: &mut watch::Receiver<ListState<T>>, pred: F) -> ListState<T>
where
    T: Clone,
    F: FnMut(&ListState<T>) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("published state never matched")
        .unwrap()
        .clone()
}

// ============================================================================
// Fresh refresh
// ============================================================================

#[tokio::test]
async fn test_refresh_all_fills_cache_and_published_state() {
    let server = MockServer::start().await;
    tab("0", EVENTS_CSV).mount(&server).await;
    tab("1", NEWS_CSV).mount(&server).await;
    tab("2", PROFILE_CSV).mount(&server).await;

    let app = test_app(&server).await;
    app.settings.set_url_validated(SHEET_URL).await.unwrap();

    let summary = app.refresh_all().await;
    assert!(summary.all_ok(), "{summary:?}");
    assert!(summary.notices().is_empty());

    // The row with too few cells is dropped, the rest survive.
    let mut events_rx = app.events.subscribe();
    let events = published(&mut events_rx, |s| s.items.len() == 3).await;
    assert_eq!(events.error, None);
    let ids: Vec<&str> = events.items.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["e3", "e1", "e2"]);
    assert_eq!(events.items[1].assigned_persons, ["Ann", "Ben"]);
    assert_eq!(events.items[2].description, "Games, pizza and prayer");

    let mut news_rx = app.news.subscribe();
    let news = published(&mut news_rx, |s| s.items.len() == 3).await;
    let latest: Vec<String> = latest_news(&news.items, Some(2), true)
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(latest, ["n2", "n1"]);

    let profile = app.db.get_profile().await.unwrap().unwrap();
    assert_eq!(profile.name, "Grace Chapel");
    assert_eq!(profile.service_times, "Sun 10am");
}

#[tokio::test]
async fn test_query_views_over_published_events() {
    let server = MockServer::start().await;
    tab("0", EVENTS_CSV).mount(&server).await;

    let app = test_app(&server).await;
    app.settings.set_url(SHEET_URL).await.unwrap();

    let mut upcoming = stream::upcoming(app.events.subscribe());
    assert!(upcoming.next().await.unwrap().is_empty());

    assert_eq!(app.events.refresh().await.unwrap(), Outcome::Fresh);

    // Harvest Drive is in the past.
    let next = loop {
        let items = upcoming.next().await.unwrap();
        if !items.is_empty() {
            break items;
        }
    };
    let ids: Vec<&str> = next.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["e1", "e2"]);

    let events = app.db.get_events().await.unwrap();
    assert_eq!(filter_by_category(&events, "youth").len(), 1);
    let pizza = search_with_filters(
        &events,
        &EventFilter {
            query: Some("PIZZA".into()),
            ..Default::default()
        },
    );
    assert_eq!(pizza.len(), 1);
    assert_eq!(pizza[0].id, "e2");
}

#[tokio::test]
async fn test_new_url_applies_on_next_refresh() {
    let server = MockServer::start().await;
    tab("0", EVENTS_CSV).expect(1).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/spreadsheets/d/DOC77/export"))
        .and(query_param("gid", "0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("ID,Title,Date\nb1,Moved Service,2099-02-01\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = test_app(&server).await;
    app.settings.set_url(SHEET_URL).await.unwrap();
    assert_eq!(app.events.refresh().await.unwrap(), Outcome::Fresh);

    app.settings
        .set_url("https://docs.google.com/spreadsheets/d/DOC77/edit")
        .await
        .unwrap();
    assert_eq!(app.events.refresh().await.unwrap(), Outcome::Fresh);

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    assert_eq!(paths, [EXPORT_PATH, "/spreadsheets/d/DOC77/export"]);

    let mut events_rx = app.events.subscribe();
    let events = published(&mut events_rx, |s| s.items.len() == 1).await;
    assert_eq!(events.items[0].id, "b1");
}

// ============================================================================
// Fallback and failure
// ============================================================================

#[tokio::test]
async fn test_server_error_serves_cached_events() {
    let server = MockServer::start().await;
    tab("0", EVENTS_CSV).up_to_n_times(1).mount(&server).await;
    failing("0", 503).mount(&server).await;

    let app = test_app(&server).await;
    app.settings.set_url(SHEET_URL).await.unwrap();

    assert_eq!(app.events.refresh().await.unwrap(), Outcome::Fresh);

    let outcome = app.events.refresh().await.unwrap();
    let notice = outcome.notice().unwrap().to_string();
    assert!(notice.starts_with("Using cached data."), "{notice}");
    assert!(notice.contains("503"), "{notice}");

    let state = app.events.snapshot();
    assert_eq!(state.items.len(), 3);
    assert_eq!(state.error.as_deref(), Some(notice.as_str()));
    assert!(!state.loading);
    assert_eq!(app.db.get_events().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_html_sign_in_page_with_empty_cache_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EXPORT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<!DOCTYPE html><html><body>id,title\ne1,Nope</body></html>"),
        )
        .mount(&server)
        .await;

    let app = test_app(&server).await;
    app.settings.set_url(SHEET_URL).await.unwrap();

    let err = app.news.refresh().await.unwrap_err();
    assert!(matches!(err, RepositoryError::Unavailable { .. }), "{err:?}");

    let state = app.news.snapshot();
    assert!(state.items.is_empty());
    assert!(state.error.is_some());
    assert!(!state.loading);

    let err = app.profile.refresh().await.unwrap_err();
    assert!(matches!(err, RepositoryError::Unavailable { .. }));
    assert_eq!(app.profile.snapshot().profile, None);
}

#[tokio::test]
async fn test_profile_falls_back_to_cache() {
    let server = MockServer::start().await;
    tab("2", PROFILE_CSV).up_to_n_times(1).mount(&server).await;
    failing("2", 500).mount(&server).await;

    let app = test_app(&server).await;
    app.settings.set_url(SHEET_URL).await.unwrap();

    assert!(app.profile.refresh().await.unwrap().is_fresh());
    let outcome = app.profile.refresh().await.unwrap();
    assert!(!outcome.is_fresh());

    let state = app.profile.snapshot();
    assert_eq!(state.profile.map(|p| p.name).as_deref(), Some("Grace Chapel"));
    assert!(state.error.is_some());
}

#[tokio::test]
async fn test_refresh_without_url_makes_no_request() {
    let server = MockServer::start().await;
    tab("0", EVENTS_CSV).expect(0).mount(&server).await;

    let app = test_app(&server).await;
    let err = app.events.refresh().await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotConfigured));
    assert_eq!(
        app.events.snapshot().error.as_deref(),
        Some("Google Sheets URL not configured")
    );
}

// ============================================================================
// Connection check and reset
// ============================================================================

#[tokio::test]
async fn test_connection_check_counts_records() {
    let server = MockServer::start().await;
    tab("0", EVENTS_CSV).mount(&server).await;
    tab("1", NEWS_CSV).mount(&server).await;
    tab("2", PROFILE_CSV).mount(&server).await;

    let app = test_app(&server).await;
    let report = app.test_connection(Some(SHEET_URL)).await;
    assert!(report.successful, "{}", report.message);
    assert_eq!((report.events, report.news, report.has_profile), (3, 3, true));

    // A check never writes to the cache.
    assert!(app.db.get_events().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reset_empties_published_lists() {
    let server = MockServer::start().await;
    tab("0", EVENTS_CSV).mount(&server).await;
    tab("1", NEWS_CSV).mount(&server).await;
    tab("2", PROFILE_CSV).mount(&server).await;

    let app = test_app(&server).await;
    app.settings.set_url(SHEET_URL).await.unwrap();
    assert!(app.refresh_all().await.all_ok());

    let mut events_rx = app.events.subscribe();
    published(&mut events_rx, |s| !s.items.is_empty()).await;

    app.reset().await.unwrap();
    published(&mut events_rx, |s| s.items.is_empty()).await;
    assert!(!app.settings.is_configured().await);
}
