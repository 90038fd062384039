use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chapel::app::{App, RefreshSummary};
use chapel::config::Config;
use chapel::model::{Event, NewsItem};
use chapel::query::{
    all_categories, category_counts, eq_ignore_case, filter_by_category, latest_news, news_between,
    news_between_in_category, news_from_last_days, search_with_filters, upcoming_events,
    urgent_news, EventFilter,
};
use chapel::repository::Outcome;
use chapel::storage::DatabaseError;

/// Get the config directory path (~/.config/chapel/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("chapel");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(
    name = "chapel",
    about = "Offline mirror of a spreadsheet-managed church calendar, newsroom and profile"
)]
struct Args {
    /// Cache database to use instead of ~/.config/chapel/chapel.db
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save the spreadsheet URL
    SetUrl {
        url: String,
        /// Also fetch every tab once and report what was found
        #[arg(long)]
        check: bool,
    },
    /// Print the saved spreadsheet URL
    ShowUrl,
    /// Forget the saved spreadsheet URL
    ClearUrl,
    /// Fetch every tab once without touching the cache
    Check {
        /// URL to check instead of the saved one
        url: Option<String>,
    },
    /// Pull all tabs and replace the cache
    Refresh,
    /// List cached events
    Events {
        /// Free-text search over title, description, topic, location, category, scripture
        #[arg(long)]
        search: Option<String>,
        /// Restrict to a category (repeatable)
        #[arg(long = "category", value_name = "CATEGORY")]
        categories: Vec<String>,
        /// Use the saved preferred categories
        #[arg(long, conflicts_with = "categories")]
        preferred: bool,
        /// Only events after now
        #[arg(long)]
        upcoming: bool,
        /// Only featured events
        #[arg(long)]
        featured: bool,
        /// Show one event in full
        #[arg(long, value_name = "ID")]
        id: Option<String>,
    },
    /// List cached news
    News {
        /// Only urgent items
        #[arg(long)]
        urgent: bool,
        /// Urgent items before the rest
        #[arg(long)]
        urgent_first: bool,
        #[arg(long)]
        limit: Option<usize>,
        /// Published on or after this date (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        /// Published on or before this date (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
        /// Published within the last N days
        #[arg(long, conflicts_with_all = ["from", "to"])]
        days: Option<u32>,
        #[arg(long)]
        category: Option<String>,
        /// Show one item in full
        #[arg(long, value_name = "ID")]
        id: Option<String>,
    },
    /// Show the church profile
    Profile,
    /// List event categories
    Categories {
        /// Count events and news per category
        #[arg(long)]
        counts: bool,
    },
    /// Add a preferred category
    Prefer { category: String },
    /// Remove a preferred category
    Unprefer { category: String },
    /// Clear the cache and all settings
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    // User-only access: the cache holds the spreadsheet URL.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;

    let db_path = args.db.unwrap_or_else(|| config_dir.join("chapel.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let app = match App::open(&config, db_path_str).await {
        Ok(app) => app,
        Err(e) if matches!(e.downcast_ref::<DatabaseError>(), Some(DatabaseError::InstanceLocked)) => {
            eprintln!("Error: Another instance of chapel appears to be running. Please close it and try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.context("Failed to open cache")),
    };

    run(&app, args.command).await
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::SetUrl { url, check } => {
            if let Err(e) = app.settings.set_url_validated(&url).await {
                eprintln!("Error: {e}");
                std::process::exit(2);
            }
            println!("Saved spreadsheet URL.");
            if check {
                println!("{}", app.test_connection(None).await.message);
            }
        }
        Command::ShowUrl => match app.settings.get_url().await? {
            Some(url) => println!("{url}"),
            None => println!("No spreadsheet URL configured. Run `chapel set-url <URL>`."),
        },
        Command::ClearUrl => {
            app.settings.clear().await?;
            println!("Spreadsheet URL cleared.");
        }
        Command::Check { url } => {
            let report = app.test_connection(url.as_deref()).await;
            println!("{}", report.message);
            if !report.successful {
                std::process::exit(1);
            }
        }
        Command::Refresh => {
            let summary = app.refresh_all().await;
            print_summary(&summary);
            if !summary.all_ok() {
                std::process::exit(1);
            }
        }
        Command::Events {
            search,
            categories,
            preferred,
            upcoming,
            featured,
            id,
        } => {
            if let Some(id) = id {
                let event = app.events.get_by_id(&id).await?;
                print_event_detail(&event);
                return Ok(());
            }
            let events = cached_events(app).await?;
            let categories = if preferred {
                app.settings.preferred_categories().await?.into_iter().collect()
            } else {
                categories
            };
            let filter = EventFilter {
                query: search,
                categories,
                featured_only: featured,
            };
            let mut events = search_with_filters(&events, &filter);
            if upcoming {
                events = upcoming_events(&events, Utc::now());
            }
            if events.is_empty() {
                println!("No events.");
            }
            for event in &events {
                print_event_line(event);
            }
        }
        Command::News {
            urgent,
            urgent_first,
            limit,
            from,
            to,
            days,
            category,
            id,
        } => {
            if let Some(id) = id {
                let item = app.news.get_by_id(&id).await?;
                print_news_detail(&item);
                return Ok(());
            }
            let mut news = cached_news(app).await?;
            news = match (from, to, days) {
                (Some(from), Some(to), _) => {
                    let start = from.and_time(NaiveTime::MIN).and_utc();
                    let end = to
                        .and_hms_milli_opt(23, 59, 59, 999)
                        .map(|t| t.and_utc())
                        .unwrap_or(start);
                    match category.as_deref() {
                        Some(c) => news_between_in_category(&news, start, end, c),
                        None => news_between(&news, start, end),
                    }
                }
                (_, _, Some(days)) => news_from_last_days(&news, days, Utc::now()),
                _ => news,
            };
            if let Some(c) = category.as_deref() {
                news = filter_by_category(&news, c);
            }
            news = if urgent {
                urgent_news(&news)
            } else {
                latest_news(&news, limit, urgent_first)
            };
            if urgent {
                if let Some(limit) = limit.filter(|&l| l > 0) {
                    news.truncate(limit);
                }
            }
            if news.is_empty() {
                println!("No news.");
            }
            for item in &news {
                print_news_line(item);
            }
        }
        Command::Profile => {
            let profile = match app.db.get_profile().await? {
                Some(p) => Some(p),
                None => {
                    report(app.profile.refresh().await);
                    app.db.get_profile().await?
                }
            };
            let Some(p) = profile else {
                println!("No church profile found.");
                return Ok(());
            };
            println!("{}", p.name);
            for (label, value) in [
                ("Welcome", &p.welcome_message),
                ("Address", &p.address),
                ("Phone", &p.phone),
                ("Website", &p.website),
                ("Email", &p.email),
                ("Mission", &p.mission),
                ("Services", &p.service_times),
                ("Social", &p.social_link),
                ("Logo", &p.logo_url),
            ] {
                if !value.trim().is_empty() {
                    println!("  {label:<9} {value}");
                }
            }
            println!("  Profile {}% complete", p.completeness_percent());
        }
        Command::Categories { counts } => {
            if counts {
                let events = app.db.get_events().await?;
                let news = app.db.get_news_items().await?;
                for (category, n) in category_counts(&events, &news) {
                    println!("{n:>4}  {category}");
                }
            } else {
                let preferred = app.settings.preferred_categories().await?;
                for category in all_categories(&app.db.get_events().await?) {
                    let marker = if preferred.iter().any(|p| eq_ignore_case(p, &category)) {
                        "*"
                    } else {
                        " "
                    };
                    println!("{marker} {category}");
                }
            }
        }
        Command::Prefer { category } => {
            app.settings.add_preferred_category(&category).await?;
            println!("Added preferred category: {}", category.trim());
        }
        Command::Unprefer { category } => {
            app.settings.remove_preferred_category(&category).await?;
            println!("Removed preferred category: {}", category.trim());
        }
        Command::Reset => {
            app.reset().await?;
            println!("Cache and settings cleared.");
        }
    }
    Ok(())
}

/// Cached events, refreshing first when the cache is empty.
async fn cached_events(app: &App) -> Result<Vec<Event>> {
    let events = app.db.get_events().await?;
    if !events.is_empty() {
        return Ok(events);
    }
    report(app.events.refresh().await);
    Ok(app.db.get_events().await?)
}

async fn cached_news(app: &App) -> Result<Vec<NewsItem>> {
    let news = app.db.get_news_items().await?;
    if !news.is_empty() {
        return Ok(news);
    }
    report(app.news.refresh().await);
    Ok(app.db.get_news_items().await?)
}

fn report<E: std::fmt::Display>(result: Result<Outcome, E>) {
    match result {
        Ok(Outcome::Fresh) => {}
        Ok(Outcome::Cached { notice }) => eprintln!("Note: {notice}"),
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn print_summary(summary: &RefreshSummary) {
    for (label, result) in [
        ("Events", &summary.events),
        ("News", &summary.news),
        ("Profile", &summary.profile),
    ] {
        match result {
            Ok(Outcome::Fresh) => println!("{label}: updated"),
            Ok(Outcome::Cached { notice }) => println!("{label}: {notice}"),
            Err(e) => println!("{label}: failed: {e}"),
        }
    }
}

fn print_event_line(event: &Event) {
    let star = if event.is_featured { "*" } else { " " };
    println!(
        "{star} {}  {:<8} {}  [{}]  @ {}",
        event.date.format("%Y-%m-%d %H:%M"),
        event.id,
        event.title,
        event.category,
        event.location_or_default()
    );
}

fn print_event_detail(event: &Event) {
    println!("{}", event.title);
    println!("{}", event.date.format("%A, %B %-d, %Y at %H:%M UTC"));
    println!("Location: {}", event.location_or_default());
    if !event.category.is_empty() {
        println!("Category: {}", event.category);
    }
    println!();
    println!("{}", event.formatted_description());
    if let Some(url) = event.maps_url() {
        println!();
        println!("Map: {url}");
    }
}

fn print_news_line(item: &NewsItem) {
    let flag = if item.is_urgent { "!" } else { " " };
    println!(
        "{flag} {}  {:<8} {}  [{}]",
        item.publish_date.format("%Y-%m-%d"),
        item.id,
        item.headline,
        item.category
    );
}

fn print_news_detail(item: &NewsItem) {
    println!("{}", item.headline);
    let byline = if item.author.is_empty() {
        String::new()
    } else {
        format!(" by {}", item.author)
    };
    println!("{}{byline}", item.publish_date.format("%B %-d, %Y"));
    if !item.scripture_reference.is_empty() {
        println!("{}", item.scripture_reference);
    }
    println!();
    println!("{}", item.body);
    if let Some(event_id) = &item.related_event_id {
        println!();
        println!("Related event: {event_id}");
    }
}
