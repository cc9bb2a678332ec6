pub mod types;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::{finite, or_default, sanitize_price, TokenListSource};
use crate::config::ProviderSettings;
use crate::http::{FetchError, HttpClient, HttpRequest};
use crate::types::{
    DefiProtocol, Exchange, GainersLosers, MarketStats, PriceMap, SocialLinks, Token, TokenDetail, TokenPlatform,
};
use types::*;

const PROVIDER: &str = "CoinMarketCap";

const LISTINGS_PATH: &str = "/v1/cryptocurrency/listings/latest";
const QUOTES_PATH: &str = "/v1/cryptocurrency/quotes/latest";
const INFO_PATH: &str = "/v2/cryptocurrency/info";
const GLOBAL_PATH: &str = "/v1/global-metrics/quotes/latest";
const EXCHANGES_PATH: &str = "/v1/exchange/listings/latest";
const CATEGORIES_PATH: &str = "/v1/cryptocurrency/categories";
const CATEGORY_PATH: &str = "/v1/cryptocurrency/category";

const LISTINGS_TIMEOUT: Duration = Duration::from_secs(15);
const QUOTES_TIMEOUT: Duration = Duration::from_secs(10);
const INFO_TIMEOUT: Duration = Duration::from_secs(10);
const GLOBAL_TIMEOUT: Duration = Duration::from_secs(10);
const CATEGORY_TIMEOUT: Duration = Duration::from_secs(10);

const MOVERS_SAMPLE: usize = 100;
const MOVERS_LIMIT: usize = 10;
const DEFI_FALLBACK_SAMPLE: usize = 500;
const DEFI_TAGS: [&str; 5] = ["defi", "decentralized-finance", "yield-farming", "lending", "dex"];

pub fn coin_image(id: u64) -> String {
    format!("https://s2.coinmarketcap.com/static/img/coins/64x64/{}.png", id)
}

pub fn exchange_logo(id: u64) -> String {
    format!("https://s2.coinmarketcap.com/static/img/exchanges/64x64/{}.png", id)
}

#[derive(Debug, Clone, Copy)]
enum MoverSide {
    Gainers,
    Losers,
}

impl MoverSide {
    fn sort_dir(self) -> &'static str {
        match self {
            MoverSide::Gainers => "desc",
            MoverSide::Losers => "asc",
        }
    }

    fn keeps(self, change: f64) -> bool {
        match self {
            MoverSide::Gainers => change > 0.0,
            MoverSide::Losers => change < 0.0,
        }
    }
}

/// Primary market-data provider backed by the CoinMarketCap Pro API.
pub struct CoinMarketCapProvider {
    http: HttpClient,
    settings: ProviderSettings,
}

impl CoinMarketCapProvider {
    pub fn new(http: HttpClient, settings: ProviderSettings) -> Self {
        Self { http, settings }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.key().is_some()
    }

    fn request(&self, path: &str, timeout: Duration) -> Result<HttpRequest, FetchError> {
        let key = self
            .settings
            .key()
            .ok_or(FetchError::NotConfigured("COINMARKETCAP_API_KEY"))?;

        Ok(HttpRequest::get(format!("{}{}", self.settings.api_url.trim_end_matches('/'), path))
            .header("X-CMC_PRO_API_KEY", key)
            .header("Accept", "application/json")
            .timeout(timeout))
    }

    async fn try_listings(&self, limit: usize, sort: &str, sort_dir: &str) -> Result<Vec<CmcCoin>, FetchError> {
        let request = self
            .request(LISTINGS_PATH, LISTINGS_TIMEOUT)?
            .query("start", 1)
            .query("limit", limit)
            .query("convert", "USD")
            .query("sort", sort)
            .query("sort_dir", sort_dir);

        let envelope: CmcEnvelope<Vec<CmcCoin>> = self.http.get_json(request).await?;
        if let Some(status) = &envelope.status {
            if let (Some(code), Some(message)) = (status.error_code, &status.error_message) {
                if code != 0 {
                    warn!("CoinMarketCap reported error {}: {}", code, message);
                }
            }
        }
        Ok(envelope.data.unwrap_or_default())
    }

    pub async fn try_get_prices(&self, symbols: &[String]) -> Result<PriceMap, FetchError> {
        // Requested symbol, uppercased, back to the form the caller used.
        let requested: HashMap<String, &String> = symbols
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| (s.trim().to_uppercase(), s))
            .collect();
        if requested.is_empty() {
            return Ok(PriceMap::new());
        }

        let mut wanted: Vec<&str> = requested.keys().map(String::as_str).collect();
        wanted.sort_unstable();

        let request = self
            .request(QUOTES_PATH, QUOTES_TIMEOUT)?
            .query("symbol", wanted.join(","))
            .query("convert", "USD")
            .query("skip_invalid", "true");

        let envelope: CmcEnvelope<CmcSymbolMap<CmcCoin>> = self.http.get_json(request).await?;

        let mut prices = PriceMap::new();
        for coin in envelope.data.unwrap_or_default().into_values().flat_map(OneOrMany::into_vec) {
            let Some(original) = requested.get(&coin.symbol.to_uppercase()) else {
                continue;
            };
            if let Some(price) = finite(coin.usd().price).filter(|p| *p > 0.0) {
                prices.entry((*original).clone()).or_insert(price);
            }
        }
        Ok(prices)
    }

    pub async fn try_get_token_detail(&self, symbol: &str) -> Result<Option<TokenDetail>, FetchError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Ok(None);
        }

        let quotes_request = self
            .request(QUOTES_PATH, QUOTES_TIMEOUT)?
            .query("symbol", &symbol)
            .query("convert", "USD");
        let info_request = self.request(INFO_PATH, INFO_TIMEOUT)?.query("symbol", &symbol);

        let (quotes, info) = tokio::join!(
            self.http.get_json::<CmcEnvelope<CmcSymbolMap<CmcCoin>>>(quotes_request),
            self.http.get_json::<CmcEnvelope<CmcSymbolMap<CmcInfo>>>(info_request),
        );

        let Some(coin) = pick_symbol(quotes?.data, &symbol).and_then(|coins| coins.into_iter().next()) else {
            return Ok(None);
        };

        let info = match info {
            Ok(envelope) => pick_symbol(envelope.data, &symbol).and_then(|entries| {
                let mut entries = entries.into_iter();
                let first = entries.next()?;
                if first.id == coin.id {
                    Some(first)
                } else {
                    entries.find(|e| e.id == coin.id).or(Some(first))
                }
            }),
            Err(e) => {
                warn!("CoinMarketCap info for {} unavailable, using quotes only: {}", symbol, e);
                None
            }
        };

        Ok(Some(merge_detail(coin, info)))
    }

    pub async fn try_get_market_stats(&self) -> Result<MarketStats, FetchError> {
        let request = self.request(GLOBAL_PATH, GLOBAL_TIMEOUT)?.query("convert", "USD");
        let envelope: CmcEnvelope<CmcGlobalMetrics> = self.http.get_json(request).await?;
        let global = envelope
            .data
            .ok_or_else(|| FetchError::Decode("global metrics response has no data".to_string()))?;
        let usd = global.quote.usd.unwrap_or_default();

        Ok(MarketStats {
            total_market_cap: sanitize_price(usd.total_market_cap),
            total_volume_24h: sanitize_price(usd.total_volume_24h),
            btc_dominance: finite(global.btc_dominance).unwrap_or(0.0),
            eth_dominance: finite(global.eth_dominance).unwrap_or(0.0),
            active_cryptocurrencies: global.active_cryptocurrencies.unwrap_or(0),
            market_cap_change_24h: finite(usd.total_market_cap_yesterday_percentage_change).unwrap_or(0.0),
        })
    }

    async fn try_movers(&self, side: MoverSide) -> Result<Vec<Token>, FetchError> {
        let coins = self
            .try_listings(MOVERS_SAMPLE, "percent_change_24h", side.sort_dir())
            .await?;

        Ok(coins
            .iter()
            .map(coin_to_token)
            .filter(|token| side.keeps(token.price_change_24h))
            .take(MOVERS_LIMIT)
            .collect())
    }

    pub async fn try_list_exchanges(&self, limit: usize) -> Result<Vec<Exchange>, FetchError> {
        let request = self
            .request(EXCHANGES_PATH, LISTINGS_TIMEOUT)?
            .query("start", 1)
            .query("limit", limit)
            .query("convert", "USD")
            .query("sort", "volume_24h");

        let envelope: CmcEnvelope<Vec<CmcExchange>> = self.http.get_json(request).await?;
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .map(|exchange| Exchange {
                id: format!("coinmarketcap-{}", exchange.id),
                logo: Some(exchange_logo(exchange.id)),
                trading_volume_24h: sanitize_price(exchange.quote.usd.and_then(|q| q.volume_24h)),
                year_established: exchange
                    .date_launched
                    .as_deref()
                    .and_then(|d| d.get(..4))
                    .and_then(|y| y.parse().ok()),
                trust_score: finite(exchange.exchange_score),
                website: exchange.website,
                country: exchange.country,
                name: exchange.name,
                slug: exchange.slug,
            })
            .collect())
    }

    async fn try_defi_category_coins(&self, limit: usize) -> Result<Vec<CmcCoin>, FetchError> {
        let request = self.request(CATEGORIES_PATH, CATEGORY_TIMEOUT)?;
        let categories: CmcEnvelope<Vec<CmcCategorySummary>> = self.http.get_json(request).await?;

        // Exact "DeFi" first; ecosystem categories like "Solana DeFi" only as a fallback.
        let categories = categories.data.unwrap_or_default();
        let Some(category) = categories
            .iter()
            .find(|c| c.name.trim().eq_ignore_ascii_case("defi"))
            .or_else(|| categories.iter().find(|c| c.name.to_lowercase().contains("defi")))
        else {
            return Ok(Vec::new());
        };

        let request = self
            .request(CATEGORY_PATH, LISTINGS_TIMEOUT)?
            .query("id", &category.id)
            .query("start", 1)
            .query("limit", limit)
            .query("convert", "USD");
        let envelope: CmcEnvelope<CmcCategory> = self.http.get_json(request).await?;
        Ok(envelope.data.map(|c| c.coins).unwrap_or_default())
    }

    /// Category lookup first; a tag-filtered general listing when that is unavailable or empty.
    pub async fn try_list_defi_protocols(&self, limit: usize) -> Result<Vec<DefiProtocol>, FetchError> {
        match self.try_defi_category_coins(limit).await {
            Ok(coins) if !coins.is_empty() => {
                return Ok(coins.iter().take(limit).map(coin_to_defi).collect());
            }
            Ok(_) => info!("DeFi category lookup returned nothing, filtering general listing"),
            Err(e @ FetchError::NotConfigured(_)) => return Err(e),
            Err(e) => warn!("DeFi category lookup failed, filtering general listing: {}", e),
        }

        let coins = self.try_listings(DEFI_FALLBACK_SAMPLE, "market_cap", "desc").await?;
        Ok(coins
            .iter()
            .filter(|coin| {
                coin.tag_slugs()
                    .iter()
                    .any(|tag| DEFI_TAGS.iter().any(|needle| tag.to_lowercase().contains(needle)))
            })
            .take(limit)
            .map(coin_to_defi)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn list_top_tokens(&self, limit: usize) -> Vec<Token> {
        or_default(PROVIDER, "listings", self.try_list_top_tokens(limit).await)
    }

    /// Prices keyed by the caller's symbol; unknown symbols are simply absent.
    #[instrument(skip(self))]
    pub async fn get_prices(&self, symbols: &[String]) -> PriceMap {
        or_default(PROVIDER, "quotes", self.try_get_prices(symbols).await)
    }

    #[instrument(skip(self))]
    pub async fn get_token_detail(&self, symbol: &str) -> Option<TokenDetail> {
        or_default(PROVIDER, "token detail", self.try_get_token_detail(symbol).await)
    }

    #[instrument(skip(self))]
    pub async fn get_market_stats(&self) -> Option<MarketStats> {
        or_default(PROVIDER, "global metrics", self.try_get_market_stats().await.map(Some))
    }

    #[instrument(skip(self))]
    pub async fn get_top_gainers_losers(&self) -> GainersLosers {
        let (gainers, losers) = tokio::join!(self.try_movers(MoverSide::Gainers), self.try_movers(MoverSide::Losers));
        GainersLosers {
            gainers: or_default(PROVIDER, "gainers", gainers),
            losers: or_default(PROVIDER, "losers", losers),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_exchanges(&self, limit: usize) -> Vec<Exchange> {
        or_default(PROVIDER, "exchanges", self.try_list_exchanges(limit).await)
    }

    #[instrument(skip(self))]
    pub async fn list_defi_protocols(&self, limit: usize) -> Vec<DefiProtocol> {
        or_default(PROVIDER, "defi listing", self.try_list_defi_protocols(limit).await)
    }
}

#[async_trait]
impl TokenListSource for CoinMarketCapProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn try_list_top_tokens(&self, limit: usize) -> Result<Vec<Token>, FetchError> {
        let coins = self.try_listings(limit, "market_cap", "desc").await?;
        Ok(coins.iter().take(limit).map(coin_to_token).collect())
    }
}

fn pick_symbol<T>(data: Option<CmcSymbolMap<T>>, symbol: &str) -> Option<Vec<T>> {
    let mut data = data?;
    let key = data.keys().find(|k| k.eq_ignore_ascii_case(symbol))?.clone();
    data.remove(&key).map(OneOrMany::into_vec)
}

pub(crate) fn coin_to_token(coin: &CmcCoin) -> Token {
    let usd = coin.usd();
    Token {
        id: format!("coinmarketcap-{}", coin.id),
        name: coin.name.clone(),
        symbol: coin.symbol.to_uppercase(),
        price: sanitize_price(usd.price),
        price_change_24h: finite(usd.percent_change_24h).unwrap_or(0.0),
        price_change_1h: finite(usd.percent_change_1h),
        price_change_7d: finite(usd.percent_change_7d),
        volume_24h: finite(usd.volume_24h),
        market_cap: finite(usd.market_cap),
        image: Some(coin_image(coin.id)),
        rank: coin.cmc_rank,
        coin_id: coin.slug.clone(),
    }
}

fn coin_to_defi(coin: &CmcCoin) -> DefiProtocol {
    let usd = coin.usd();
    DefiProtocol {
        id: format!("coinmarketcap-{}", coin.id),
        name: coin.name.clone(),
        symbol: coin.symbol.to_uppercase(),
        logo: Some(coin_image(coin.id)),
        tvl: sanitize_price(usd.market_cap),
        tvl_change_24h: finite(usd.percent_change_24h).unwrap_or(0.0),
        chains: coin.platform.iter().map(|p| p.name.clone()).collect(),
        website: None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn find_link(links: &[String], needles: &[&str]) -> Option<String> {
    links
        .iter()
        .find(|link| needles.iter().any(|n| link.to_lowercase().contains(n)))
        .cloned()
}

/// Numbers come from the quote; descriptive fields prefer the info record.
fn merge_detail(coin: CmcCoin, info: Option<CmcInfo>) -> TokenDetail {
    let usd = coin.usd();
    let mut token = coin_to_token(&coin);
    let info = info.as_ref();
    let urls = info.map(|i| i.urls.clone()).unwrap_or_default();

    if let Some(logo) = info.and_then(|i| non_blank(i.logo.clone())) {
        token.image = Some(logo);
    }

    let tags = info
        .and_then(|i| i.tags.clone())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| coin.tag_slugs());

    let platform = coin
        .platform
        .clone()
        .or_else(|| info.and_then(|i| i.platform.clone()))
        .map(|p| TokenPlatform {
            name: p.name,
            symbol: p.symbol,
            token_address: p.token_address,
        });

    TokenDetail {
        token,
        circulating_supply: finite(coin.circulating_supply),
        total_supply: finite(coin.total_supply),
        max_supply: finite(coin.max_supply),
        fully_diluted_market_cap: finite(usd.fully_diluted_market_cap),
        market_cap_dominance: finite(usd.market_cap_dominance),
        // supply barely moves in a day, so cap change tracks price change
        market_cap_change_24h: finite(usd.percent_change_24h),
        volume_change_24h: finite(usd.volume_change_24h),
        price_change_30d: finite(usd.percent_change_30d),
        price_change_60d: finite(usd.percent_change_60d),
        price_change_90d: finite(usd.percent_change_90d),
        description: info.and_then(|i| non_blank(i.description.clone())),
        website: urls.website.first().cloned(),
        whitepaper: urls.technical_doc.first().cloned(),
        tags,
        social_links: SocialLinks {
            twitter: urls.twitter.first().cloned(),
            reddit: urls.reddit.first().cloned(),
            telegram: find_link(&urls.chat, &["t.me", "telegram"]),
            discord: find_link(&urls.chat, &["discord"]),
            github: find_link(&urls.source_code, &["github"]),
        },
        platform,
        date_added: info
            .and_then(|i| non_blank(i.date_added.clone()))
            .or_else(|| non_blank(coin.date_added.clone())),
        date_launched: info.and_then(|i| non_blank(i.date_launched.clone())),
    }
}
