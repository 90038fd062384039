use chrono::{DateTime, Duration, Utc};
use std::cmp::Reverse;

use super::categories::eq_ignore_case;
use crate::model::NewsItem;

fn newest_first(items: &mut [NewsItem]) {
    items.sort_by_key(|n| Reverse(n.publish_date));
}

/// News newest first, optionally urgent items first, optionally truncated.
///
/// `limit` of `None` or `Some(0)` returns everything.
pub fn latest_news(items: &[NewsItem], limit: Option<usize>, urgent_first: bool) -> Vec<NewsItem> {
    let mut news = items.to_vec();
    if urgent_first {
        news.sort_by_key(|n| (Reverse(n.is_urgent), Reverse(n.publish_date)));
    } else {
        newest_first(&mut news);
    }
    if let Some(limit) = limit.filter(|&l| l > 0) {
        news.truncate(limit);
    }
    news
}

/// Urgent items only, newest first.
pub fn urgent_news(items: &[NewsItem]) -> Vec<NewsItem> {
    let mut news: Vec<NewsItem> = items.iter().filter(|n| n.is_urgent).cloned().collect();
    newest_first(&mut news);
    news
}

/// News published within `[start, end]` (inclusive), newest first.
pub fn news_between(
    items: &[NewsItem],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<NewsItem> {
    let mut news: Vec<NewsItem> = items
        .iter()
        .filter(|n| n.publish_date >= start && n.publish_date <= end)
        .cloned()
        .collect();
    newest_first(&mut news);
    news
}

/// [`news_between`] restricted to one category (case-insensitive).
pub fn news_between_in_category(
    items: &[NewsItem],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    category: &str,
) -> Vec<NewsItem> {
    let mut news = news_between(items, start, end);
    news.retain(|n| eq_ignore_case(&n.category, category));
    news
}

/// News published at or after `now - days`, newest first.
pub fn news_from_last_days(items: &[NewsItem], days: u32, now: DateTime<Utc>) -> Vec<NewsItem> {
    let cutoff = now - Duration::days(i64::from(days));
    let mut news: Vec<NewsItem> = items
        .iter()
        .filter(|n| n.publish_date >= cutoff)
        .cloned()
        .collect();
    newest_first(&mut news);
    news
}
