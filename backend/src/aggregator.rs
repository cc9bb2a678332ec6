use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::airdrops::AirdropScraper;
use crate::config::HubConfig;
use crate::feeds::{filter_ai_news, sort_by_recency, FeedNormalizer, FeedSource};
use crate::http::{FetchError, HttpClient};
use crate::providers::{ProviderManager, TokenListSource};
use crate::types::{Airdrop, NewsItem, SearchResults, Token};

pub const SEARCH_MIN_QUERY_LEN: usize = 2;
pub const SEARCH_RESULT_CAP: usize = 12;
pub const SEARCH_TOKEN_SAMPLE: usize = 200;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("{source_label}: {error}")]
    SourceFailed { source_label: String, error: FetchError },
    #[error("{0} task aborted")]
    TaskAborted(String),
}

/// One fetch operation participating in a fan-out.
#[async_trait]
pub trait Source<T>: Send + Sync {
    fn label(&self) -> String;

    async fn fetch(&self) -> Result<Vec<T>, FetchError>;
}

/// An RSS or Atom feed as an aggregation source.
pub struct FeedTask {
    normalizer: FeedNormalizer,
    feed: FeedSource,
}

impl FeedTask {
    pub fn new(normalizer: FeedNormalizer, feed: FeedSource) -> Self {
        Self { normalizer, feed }
    }
}

#[async_trait]
impl Source<NewsItem> for FeedTask {
    fn label(&self) -> String {
        self.feed.source.clone()
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>, FetchError> {
        self.normalizer.try_fetch_feed(&self.feed).await
    }
}

/// A provider's token listing as an aggregation source.
pub struct TokenListTask {
    provider: Arc<dyn TokenListSource>,
    limit: usize,
}

impl TokenListTask {
    pub fn new(provider: Arc<dyn TokenListSource>, limit: usize) -> Self {
        Self { provider, limit }
    }
}

#[async_trait]
impl Source<Token> for TokenListTask {
    fn label(&self) -> String {
        self.provider.name().to_string()
    }

    async fn fetch(&self) -> Result<Vec<Token>, FetchError> {
        self.provider.try_list_top_tokens(self.limit).await
    }
}

/// Runs every source on its own task and waits for all of them.
///
/// Results come back in source order. A source that errors, or whose task
/// panics, contributes an `Err` without disturbing its siblings.
pub async fn settle_all<T>(sources: Vec<Arc<dyn Source<T>>>) -> Vec<Result<Vec<T>, AggregatorError>>
where
    T: Send + 'static,
{
    let handles: Vec<_> = sources
        .into_iter()
        .map(|source| {
            let label = source.label();
            let handle = tokio::spawn(async move { source.fetch().await });
            (label, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (label, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(items)) => Ok(items),
            Ok(Err(error)) => Err(AggregatorError::SourceFailed { source_label: label, error }),
            Err(join_error) => {
                error!("Source {} panicked or was cancelled: {}", label, join_error);
                Err(AggregatorError::TaskAborted(label))
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

/// Concatenates every successful source in source order.
#[instrument(skip(sources), fields(sources = sources.len()))]
pub async fn aggregate<T>(sources: Vec<Arc<dyn Source<T>>>) -> Vec<T>
where
    T: Send + 'static,
{
    let mut combined = Vec::new();
    let mut failures = 0;

    for outcome in settle_all(sources).await {
        match outcome {
            Ok(items) => combined.extend(items),
            Err(e) => {
                failures += 1;
                warn!("Aggregation source failed: {}", e);
            }
        }
    }

    info!("Aggregated {} items ({} sources failed)", combined.len(), failures);
    combined
}

fn contains(field: Option<&str>, query: &str) -> bool {
    field.map_or(false, |f| f.to_lowercase().contains(query))
}

pub fn token_matches(token: &Token, query: &str) -> bool {
    contains(Some(token.name.as_str()), query) || contains(Some(token.symbol.as_str()), query)
}

pub fn news_matches(item: &NewsItem, query: &str) -> bool {
    contains(Some(item.title.as_str()), query)
        || contains(item.content.as_deref(), query)
        || contains(Some(item.source.as_str()), query)
}

pub fn airdrop_matches(airdrop: &Airdrop, query: &str) -> bool {
    contains(Some(airdrop.title.as_str()), query)
        || contains(airdrop.description.as_deref(), query)
        || contains(airdrop.category.as_deref(), query)
}

fn capped<T: Clone>(items: &[T], matches: impl Fn(&T) -> bool) -> (Vec<T>, usize) {
    let all: Vec<&T> = items.iter().filter(|item| matches(*item)).collect();
    let count = all.len();
    (all.into_iter().take(SEARCH_RESULT_CAP).cloned().collect(), count)
}

/// Filters already-fetched collections against a query, each type capped independently.
pub fn filter_search(query: &str, tokens: &[Token], news: &[NewsItem], airdrops: &[Airdrop]) -> SearchResults {
    let needle = query.trim().to_lowercase();
    let (tokens, token_count) = capped(tokens, |t| token_matches(t, &needle));
    let (news, news_count) = capped(news, |n| news_matches(n, &needle));
    let (airdrops, airdrop_count) = capped(airdrops, |a| airdrop_matches(a, &needle));

    SearchResults {
        query: query.trim().to_string(),
        tokens,
        news,
        airdrops,
        token_count,
        news_count,
        airdrop_count,
    }
}

/// Front door for the multi-source reads the API exposes.
pub struct Aggregator {
    feeds: FeedNormalizer,
    providers: Arc<ProviderManager>,
    airdrops: Arc<AirdropScraper>,
    crypto_feeds: Vec<FeedSource>,
    ai_feeds: Vec<FeedSource>,
}

impl Aggregator {
    pub fn new(
        feeds: FeedNormalizer,
        providers: Arc<ProviderManager>,
        airdrops: Arc<AirdropScraper>,
        crypto_feeds: Vec<FeedSource>,
        ai_feeds: Vec<FeedSource>,
    ) -> Self {
        Self {
            feeds,
            providers,
            airdrops,
            crypto_feeds,
            ai_feeds,
        }
    }

    /// Wires every source from configuration over one shared client.
    pub fn from_config(config: &HubConfig, http: HttpClient) -> Self {
        info!("🔄 Initializing aggregator...");
        let feeds = FeedNormalizer::new(http.clone(), Duration::from_secs(config.feeds.timeout_seconds));
        let providers = Arc::new(ProviderManager::new(config, http.clone()));
        let airdrops = Arc::new(AirdropScraper::new(http, config.airdrops.clone()));

        info!(
            "✅ Aggregator initialized ({} crypto feeds, {} AI feeds, token sources: {:?})",
            config.feeds.crypto_feeds.len(),
            config.feeds.ai_feeds.len(),
            providers.source_names()
        );
        Self::new(
            feeds,
            providers,
            airdrops,
            config.feeds.crypto_feeds.clone(),
            config.feeds.ai_feeds.clone(),
        )
    }

    pub fn providers(&self) -> &ProviderManager {
        &self.providers
    }

    pub fn scraper(&self) -> &AirdropScraper {
        &self.airdrops
    }

    pub fn feed_tasks(&self, feeds: &[FeedSource]) -> Vec<Arc<dyn Source<NewsItem>>> {
        feeds
            .iter()
            .map(|feed| Arc::new(FeedTask::new(self.feeds.clone(), feed.clone())) as Arc<dyn Source<NewsItem>>)
            .collect()
    }

    /// News from the given feeds, newest first.
    pub async fn aggregate_news(&self, feeds: &[FeedSource]) -> Vec<NewsItem> {
        let mut items = aggregate(self.feed_tasks(feeds)).await;
        sort_by_recency(&mut items);
        items
    }

    #[instrument(skip(self))]
    pub async fn crypto_news(&self) -> Vec<NewsItem> {
        self.aggregate_news(&self.crypto_feeds).await
    }

    #[instrument(skip(self))]
    pub async fn ai_news(&self) -> Vec<NewsItem> {
        filter_ai_news(self.aggregate_news(&self.ai_feeds).await)
    }

    /// Listings from every configured provider side by side, unmerged.
    pub async fn all_provider_tokens(&self, limit: usize) -> Vec<Token> {
        let tasks = self
            .providers
            .token_sources()
            .iter()
            .map(|provider| Arc::new(TokenListTask::new(provider.clone(), limit)) as Arc<dyn Source<Token>>)
            .collect();
        aggregate(tasks).await
    }

    /// Tokens, crypto news and airdrops fetched together and filtered by substring.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> SearchResults {
        let trimmed = query.trim();
        if trimmed.chars().count() < SEARCH_MIN_QUERY_LEN {
            return SearchResults {
                query: trimmed.to_string(),
                ..Default::default()
            };
        }

        let (tokens, news, airdrops) = tokio::join!(
            self.providers.list_top_tokens(SEARCH_TOKEN_SAMPLE),
            self.aggregate_news(&self.crypto_feeds),
            self.airdrops.scrape_airdrops(),
        );

        let results = filter_search(trimmed, &tokens, &news, &airdrops);
        info!("Search '{}' matched {} results", trimmed, results.total());
        results
    }
}
