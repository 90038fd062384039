use std::collections::BTreeMap;

use crate::model::{Event, NewsItem, SheetRecord};

/// Unicode case-insensitive equality without allocating.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Unicode case-insensitive substring test. `needle` must already be lowercase.
pub(crate) fn contains_lowercase(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Records whose category equals `category`, ignoring case. A blank
/// `category` keeps everything.
pub fn filter_by_category<T: SheetRecord>(items: &[T], category: &str) -> Vec<T> {
    let category = category.trim();
    if category.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|r| eq_ignore_case(r.category(), category))
        .cloned()
        .collect()
}

/// Records whose category matches any of `categories`, ignoring case. An
/// empty set keeps everything.
pub fn filter_by_categories<T, S>(items: &[T], categories: &[S]) -> Vec<T>
where
    T: SheetRecord,
    S: AsRef<str>,
{
    if categories.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|r| categories.iter().any(|c| eq_ignore_case(r.category(), c.as_ref())))
        .cloned()
        .collect()
}

/// Apply one category to both events and news at once.
pub fn filter_both(
    events: &[Event],
    news: &[NewsItem],
    category: &str,
) -> (Vec<Event>, Vec<NewsItem>) {
    (
        filter_by_category(events, category),
        filter_by_category(news, category),
    )
}

/// Distinct non-blank categories, sorted.
pub fn all_categories<T: SheetRecord>(items: &[T]) -> Vec<String> {
    let mut categories: Vec<String> = items
        .iter()
        .map(|r| r.category())
        .filter(|c| !c.trim().is_empty())
        .map(str::to_string)
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

/// Number of events plus news items per category. Blank categories are
/// skipped; categories differing only in case are counted separately.
pub fn category_counts(events: &[Event], news: &[NewsItem]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let labels = events
        .iter()
        .map(|e| e.category.as_str())
        .chain(news.iter().map(|n| n.category.as_str()));
    for label in labels.filter(|c| !c.trim().is_empty()) {
        *counts.entry(label.to_string()).or_insert(0) += 1;
    }
    counts
}
