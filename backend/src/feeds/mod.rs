pub mod parser;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::http::{FetchError, HttpClient, HttpRequest};
use crate::types::NewsItem;

pub use parser::{parse_feed, parse_timestamp};

const RELATED_NEWS_LIMIT: usize = 6;

/// A feed URL plus the human label its items are attributed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSource {
    pub url: String,
    pub source: String,
}

impl FeedSource {
    pub fn new(url: &str, source: &str) -> Self {
        Self {
            url: url.to_string(),
            source: source.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct FeedNormalizer {
    http: HttpClient,
    timeout: Duration,
}

impl FeedNormalizer {
    pub fn new(http: HttpClient, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Fetches and parses one feed, surfacing the failure reason.
    pub async fn try_fetch_feed(&self, feed: &FeedSource) -> Result<Vec<NewsItem>, FetchError> {
        let request = HttpRequest::get(&feed.url)
            .header("Accept", "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8")
            .timeout(self.timeout);
        let body = self.http.get_text(request).await?;
        parse_feed(&body, &feed.source, Utc::now())
    }

    /// Fail-soft variant: any network, timeout or parse failure yields an empty list.
    #[instrument(skip(self), fields(source = %feed.source))]
    pub async fn fetch_feed(&self, feed: &FeedSource) -> Vec<NewsItem> {
        match self.try_fetch_feed(feed).await {
            Ok(items) => {
                if items.is_empty() {
                    warn!("No items found in RSS feed from {} ({})", feed.source, feed.url);
                } else {
                    info!("Fetched {} items from {}", items.len(), feed.source);
                }
                items
            }
            Err(e) => {
                error!("Error fetching RSS feed from {} ({}): {}", feed.source, feed.url, e);
                Vec::new()
            }
        }
    }

    /// Fetches every feed concurrently, concatenates in input order, then sorts newest first.
    pub async fn fetch_multiple_feeds(&self, feeds: &[FeedSource]) -> Vec<NewsItem> {
        info!("Fetching {} RSS feeds...", feeds.len());

        let results = join_all(feeds.iter().map(|feed| self.try_fetch_feed(feed))).await;

        let mut all_items = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for (feed, result) in feeds.iter().zip(results) {
            match result {
                Ok(items) => {
                    success_count += 1;
                    all_items.extend(items);
                }
                Err(e) => {
                    failure_count += 1;
                    error!("Failed to fetch feed {}: {}", feed.source, e);
                }
            }
        }

        info!(
            "RSS fetch complete: {} succeeded, {} failed, {} total items",
            success_count,
            failure_count,
            all_items.len()
        );

        sort_by_recency(&mut all_items);
        all_items
    }
}

/// Stable newest-first ordering; items whose date does not parse sink to the end.
pub fn sort_by_recency(items: &mut [NewsItem]) {
    items.sort_by_key(|item| Reverse(parse_timestamp(&item.pub_date)));
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.map_or(false, |h| h.to_lowercase().contains(needle))
}

/// Keeps AI-related items; returns everything when nothing matches.
pub fn filter_ai_news(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let ai_items: Vec<NewsItem> = items
        .iter()
        .filter(|item| {
            let title = item.title.to_lowercase();
            title.contains("ai")
                || title.contains("artificial intelligence")
                || title.contains("machine learning")
                || title.contains("ml")
                || contains_ci(item.content.as_deref(), "ai")
                || contains_ci(item.content.as_deref(), "artificial intelligence")
        })
        .cloned()
        .collect();

    if ai_items.is_empty() {
        items
    } else {
        ai_items
    }
}

/// Items mentioning a token by name or symbol, capped for the detail view.
pub fn related_news(items: &[NewsItem], name: &str, symbol: &str) -> Vec<NewsItem> {
    let name = name.to_lowercase();
    let symbol = symbol.to_lowercase();

    items
        .iter()
        .filter(|item| {
            let title = item.title.to_lowercase();
            title.contains(&name)
                || title.contains(&symbol)
                || contains_ci(item.content.as_deref(), &name)
                || contains_ci(item.content.as_deref(), &symbol)
        })
        .take(RELATED_NEWS_LIMIT)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{StubReply, StubTransport};
    use std::sync::Arc;

    fn rss_with(items: &[(&str, &str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, link, date)| {
                format!(
                    "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate></item>",
                    title, link, date
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title><link>https://x</link><description>d</description>{}</channel></rss>"#,
            body
        )
    }

    fn item(title: &str, date: &str) -> NewsItem {
        NewsItem {
            id: title.to_string(),
            title: title.to_string(),
            link: "#".to_string(),
            pub_date: date.to_string(),
            content: None,
            source: "test".to_string(),
            image: None,
        }
    }

    #[test]
    fn test_sort_is_newest_first_and_stable() {
        let mut items = vec![
            item("old", "2024-01-01T00:00:00Z"),
            item("tie-a", "2024-01-02T00:00:00Z"),
            item("garbage", "not a date"),
            item("tie-b", "2024-01-02T00:00:00Z"),
            item("new", "2024-01-03T00:00:00Z"),
        ];

        sort_by_recency(&mut items);

        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "tie-a", "tie-b", "old", "garbage"]);
    }

    #[tokio::test]
    async fn test_fetch_feed_fails_soft_on_timeout() {
        let stub = Arc::new(StubTransport::new().on("slow.example", StubReply::Timeout));
        let normalizer = FeedNormalizer::new(HttpClient::new(stub), Duration::from_secs(10));

        let items = normalizer
            .fetch_feed(&FeedSource::new("https://slow.example/rss", "Slow"))
            .await;

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_feed_sends_bounded_timeout() {
        let stub = Arc::new(StubTransport::new().on(
            "feed.example",
            StubReply::text(rss_with(&[("A", "https://a", "Mon, 01 Jan 2024 00:00:00 GMT")])),
        ));
        let normalizer = FeedNormalizer::new(HttpClient::new(stub.clone()), Duration::from_secs(10));

        let items = normalizer
            .fetch_feed(&FeedSource::new("https://feed.example/rss", "Feed"))
            .await;

        assert_eq!(items.len(), 1);
        assert_eq!(stub.requests()[0].timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_multiple_feeds_merge_and_sort() {
        let stub = Arc::new(
            StubTransport::new()
                .on(
                    "one.example",
                    StubReply::text(rss_with(&[
                        ("One old", "https://one/1", "Mon, 01 Jan 2024 00:00:00 GMT"),
                        ("One new", "https://one/2", "Fri, 05 Jan 2024 00:00:00 GMT"),
                    ])),
                )
                .on(
                    "two.example",
                    StubReply::text(rss_with(&[("Two mid", "https://two/1", "Wed, 03 Jan 2024 00:00:00 GMT")])),
                )
                .on("broken.example", StubReply::text("<<<not xml")),
        );
        let normalizer = FeedNormalizer::new(HttpClient::new(stub), Duration::from_secs(10));

        let items = normalizer
            .fetch_multiple_feeds(&[
                FeedSource::new("https://one.example/rss", "One"),
                FeedSource::new("https://broken.example/rss", "Broken"),
                FeedSource::new("https://two.example/rss", "Two"),
            ])
            .await;

        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["One new", "Two mid", "One old"]);
    }

    #[test]
    fn test_ai_filter_falls_back_to_everything() {
        let items = vec![item("Rust 2.0 released", "x"), item("Market wrap", "y")];
        assert_eq!(filter_ai_news(items.clone()).len(), 2);

        let mut with_ai = items;
        with_ai.push(item("New AI model launched", "z"));
        let filtered = filter_ai_news(with_ai);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "New AI model launched");
    }

    #[test]
    fn test_related_news_matches_name_or_symbol() {
        let mut items: Vec<NewsItem> = (0..10).map(|i| item(&format!("Bitcoin story {}", i), "x")).collect();
        items.push(item("Unrelated", "x"));
        let mut tagged = item("Market wrap", "x");
        tagged.content = Some("BTC closes higher".to_string());
        items.insert(0, tagged);

        let related = related_news(&items, "Bitcoin", "BTC");

        assert_eq!(related.len(), 6);
        assert_eq!(related[0].title, "Market wrap");
        assert!(related.iter().all(|i| i.title != "Unrelated"));
    }
}
