pub mod history;
pub mod types;

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{instrument, warn};

use super::{finite, or_default, sanitize_price, TokenListSource};
use crate::config::ProviderSettings;
use crate::http::{FetchError, HttpClient, HttpRequest};
use crate::types::{PriceUpdate, Token};
use self::types::{SimplePriceMap, TrendingResponse};

pub use history::PriceHistoryProvider;

const PROVIDER: &str = "CoinGecko";

const TRENDING_PATH: &str = "/search/trending";
const SIMPLE_PRICE_PATH: &str = "/simple/price";

const TIMEOUT: Duration = Duration::from_secs(10);

/// Builds a request against the configured base URL, attaching the demo key when present.
pub(crate) fn coingecko_request(settings: &ProviderSettings, path: &str, timeout: Duration) -> HttpRequest {
    let mut request = HttpRequest::get(format!("{}{}", settings.api_url.trim_end_matches('/'), path))
        .header("Accept", "application/json")
        .timeout(timeout);
    if let Some(key) = settings.key() {
        request = request.header("x-cg-demo-api-key", key);
    }
    request
}

/// Free fallback provider: trending coins enriched with simple prices.
pub struct CoinGeckoProvider {
    http: HttpClient,
    settings: ProviderSettings,
}

impl CoinGeckoProvider {
    pub fn new(http: HttpClient, settings: ProviderSettings) -> Self {
        Self { http, settings }
    }

    pub async fn try_simple_prices(&self, ids: &[String]) -> Result<SimplePriceMap, FetchError> {
        if ids.is_empty() {
            return Ok(SimplePriceMap::new());
        }
        let request = coingecko_request(&self.settings, SIMPLE_PRICE_PATH, TIMEOUT)
            .query("ids", ids.join(","))
            .query("vs_currencies", "usd")
            .query("include_24hr_change", "true")
            .query("include_market_cap", "true");
        self.http.get_json(request).await
    }

    pub async fn try_price_updates(&self, ids: &[String]) -> Result<Vec<PriceUpdate>, FetchError> {
        let ids: Vec<String> = ids
            .iter()
            .map(|id| id.trim().to_lowercase())
            .filter(|id| !id.is_empty())
            .collect();
        let prices = self.try_simple_prices(&ids).await?;
        let timestamp = Utc::now().timestamp_millis();

        // keep caller order; ids the API did not recognize are left out
        Ok(ids
            .iter()
            .filter_map(|id| {
                prices.get(id).map(|price| PriceUpdate {
                    coin_id: id.clone(),
                    symbol: id.to_uppercase(),
                    price: sanitize_price(price.usd),
                    price_change_24h: finite(price.usd_24h_change).unwrap_or(0.0),
                    timestamp,
                })
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn list_top_tokens(&self, limit: usize) -> Vec<Token> {
        or_default(PROVIDER, "trending", self.try_list_top_tokens(limit).await)
    }

    #[instrument(skip(self))]
    pub async fn get_price_updates(&self, ids: &[String]) -> Vec<PriceUpdate> {
        or_default(PROVIDER, "simple price", self.try_price_updates(ids).await)
    }
}

#[async_trait]
impl TokenListSource for CoinGeckoProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn try_list_top_tokens(&self, limit: usize) -> Result<Vec<Token>, FetchError> {
        let request = coingecko_request(&self.settings, TRENDING_PATH, TIMEOUT);
        let trending: TrendingResponse = self.http.get_json(request).await?;
        let items: Vec<_> = trending.coins.into_iter().map(|c| c.item).take(limit).collect();
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let prices = match self.try_simple_prices(&ids).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!("CoinGecko simple price failed, returning trending coins without prices: {}", e);
                SimplePriceMap::new()
            }
        };

        Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let price = prices.get(&item.id).cloned().unwrap_or_default();
                Token {
                    id: format!("coingecko-{}", item.id),
                    name: item.name,
                    symbol: item.symbol.to_uppercase(),
                    price: sanitize_price(price.usd),
                    price_change_24h: finite(price.usd_24h_change).unwrap_or(0.0),
                    market_cap: finite(price.usd_market_cap),
                    image: item.large.or(item.small).or(item.thumb),
                    rank: Some(index as u32 + 1),
                    coin_id: item.id,
                    ..Default::default()
                }
            })
            .collect())
    }
}
